use color_eyre::eyre;
use indoc::indoc;
use kube_migrate_yaml::{EmitError, Emitter, Node, Stream, Tree, emit_stream, load_from_str};

fn reemit(src: &str) -> eyre::Result<String> {
    let stream = load_from_str(src)?;
    Ok(emit_stream(&stream)?)
}

#[test]
fn normalized_documents_are_written_back_unchanged() -> eyre::Result<()> {
    let _guard = test_util::builder().build();
    let src = indoc! {r#"
        apiVersion: v1
        kind: Pod
        metadata:
          name: web
          annotations:
            prometheus.io/scrape: "true"
        spec:
          containers:
            - name: nginx
              image: nginx:1.25
              args: ["--port", "8080"]
              env:
                - name: GREETING
                  value: 'hello, world'
              command:
                - /bin/sh
                - -c
                - |
                  echo starting
                  exec nginx
          volumes: []
          nodeSelector: {}
    "#};
    similar_asserts::assert_eq!(reemit(src)?, src);
    Ok(())
}

#[test]
fn nested_sequences_and_anchored_items() -> eyre::Result<()> {
    let src = indoc! {"
        matrix:
          - - 1
            - 2
          - &pair
            a: 1
            b: 2
          - *pair
        empty:
        list:
          -
          - x
    "};
    similar_asserts::assert_eq!(reemit(src)?, src);
    Ok(())
}

#[test]
fn block_scalars_keep_their_chomping() -> eyre::Result<()> {
    let src = indoc! {"
        strip: |-
          no newline
        clip: |
          one newline
        keep: |+
          two newlines

        indented: |2
            leading spaces
        folded: >
          folded
          text
    "};
    similar_asserts::assert_eq!(
        reemit(src)?,
        indoc! {"
            strip: |-
              no newline
            clip: |
              one newline
            keep: |+
              two newlines

            indented: |2
                leading spaces
            folded: |
              folded text
        "}
    );
    Ok(())
}

#[test]
fn untouched_values_round_trip_semantically() -> eyre::Result<()> {
    let src = indoc! {r#"
        # comments are dropped
        plain: value   # trailing comment
        quoted: "tab\there"
        multi: "line one
          line two"
        tagged: !!str 42
        flow: { a: [1, 2], "b c": {d: e} }
        ? complex
        : key
    "#};
    let out = reemit(src)?;
    let before: serde_yaml::Value = serde_yaml::from_str(src)?;
    let after: serde_yaml::Value = serde_yaml::from_str(&out)?;
    similar_asserts::assert_eq!(before, after);
    assert!(out.contains("tagged: !!str 42\n"), "{out}");
    assert!(out.contains("flow: {a: [1, 2], \"b c\": {d: e}}\n"), "{out}");
    Ok(())
}

#[test]
fn documents_are_separated() -> eyre::Result<()> {
    let src = indoc! {"
        kind: Service
        ---
        kind: Deployment
    "};
    similar_asserts::assert_eq!(reemit(src)?, src);
    Ok(())
}

#[test]
fn empty_documents_keep_the_document_count() -> eyre::Result<()> {
    let leading = "---\n---\na: 1\n";
    let out = reemit(leading)?;
    similar_asserts::assert_eq!(out, leading);
    assert_eq!(load_from_str(&out)?.documents.len(), 2);

    let out = reemit("a: 1\n---\n")?;
    similar_asserts::assert_eq!(out, "---\na: 1\n---\n");
    assert_eq!(load_from_str(&out)?.documents.len(), 2);

    // an explicit null is text of its own and needs no extra markers
    similar_asserts::assert_eq!(reemit("~\n---\na: 1\n")?, "~\n---\na: 1\n");
    Ok(())
}

#[test]
fn built_nodes_are_emitted_in_block_style() -> eyre::Result<()> {
    let mut tree = Tree::new();
    let app = tree.string("app");
    let web = tree.string("web");
    let labels = tree.mapping(vec![app, web]);
    let match_labels = tree.string("matchLabels");
    let selector_value = tree.mapping(vec![match_labels, labels]);
    let selector = tree.string("selector");
    let enabled = tree.string("enabled");
    let yes = tree.string("true");
    let root = tree.mapping(vec![selector, selector_value, enabled, yes]);
    let doc = tree.push(Node::Document {
        content: vec![root],
    });

    similar_asserts::assert_eq!(
        Emitter::new().emit_document(&tree, doc)?,
        indoc! {r#"
            selector:
              matchLabels:
                app: web
            enabled: "true"
        "#}
    );
    similar_asserts::assert_eq!(
        Emitter::new().with_indent(4).emit_document(&tree, doc)?,
        indoc! {r#"
            selector:
                matchLabels:
                    app: web
            enabled: "true"
        "#}
    );
    Ok(())
}

#[test]
fn shared_node_without_anchor_is_written_at_each_site() -> eyre::Result<()> {
    let mut stream = load_from_str("labels: {app: web}\n")?;
    let doc = stream.documents[0];
    let (labels, _) = stream
        .tree
        .find_field(doc, "labels")
        .ok_or_else(|| eyre::eyre!("labels not found"))?;
    let key = stream.tree.string("copy");
    let root = stream.tree.node(doc).content()[0];
    stream
        .tree
        .content_mut(root)
        .ok_or_else(|| eyre::eyre!("root is not a mapping"))?
        .extend([key, labels]);

    similar_asserts::assert_eq!(
        emit_stream(&stream)?,
        "labels: {app: web}\ncopy: {app: web}\n"
    );
    Ok(())
}

#[test]
fn unpaired_mapping_is_an_error() {
    let mut tree = Tree::new();
    let key = tree.string("dangling");
    let root = tree.mapping(vec![key]);
    let doc = tree.push(Node::Document {
        content: vec![root],
    });
    let stream = Stream {
        tree,
        documents: vec![doc],
    };

    let err = emit_stream(&stream).unwrap_err();
    assert!(
        matches!(err, EmitError::UnpairedMapping { node } if node == root),
        "unexpected error: {err:?}"
    );
}

#[test]
fn non_document_roots_are_rejected() {
    let mut tree = Tree::new();
    let scalar = tree.string("x");
    let err = Emitter::new().emit_document(&tree, scalar).unwrap_err();
    assert!(matches!(err, EmitError::NotADocument { .. }), "{err:?}");
}
