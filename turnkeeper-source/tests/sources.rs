use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use turnkeeper_core::{
    fetch_document, Command, DocumentSource, LoadErrorKind, LoadOutcome, MemoryStateStore,
    Session,
};
use turnkeeper_source::{DirectorySource, MemorySource};

const HARBOR: &str = r#"{
    "gameInfo": { "title": "Harbor Lights" },
    "tabs": [
        { "id": "setup", "name": "Setup", "steps": [
            { "id": "s1", "title": "Board", "detail": "Place the board." },
            { "id": "s2", "title": "Cards", "detail": "Deal five cards." }
        ] }
    ]
}"#;

const FRONTIER: &str = r#"{
    "gameInfo": { "title": "Frontier" },
    "tabs": [ { "id": "round", "name": "Round", "steps": [] } ]
}"#;

#[tokio::test]
async fn directory_source_resolves_ids_with_and_without_extension() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("harbor.json"), HARBOR).unwrap();
    let source = DirectorySource::new(dir.path()).unwrap();

    let bare = source.fetch("harbor").await.unwrap();
    let named = source.fetch("harbor.json").await.unwrap();
    assert_eq!(bare, named);

    let absolute = dir.path().join("harbor.json");
    let by_path = source.fetch(absolute.to_str().unwrap()).await.unwrap();
    assert_eq!(by_path, bare);
}

#[tokio::test]
async fn directory_source_reports_missing_documents() {
    let dir = tempdir().unwrap();
    let source = DirectorySource::new(dir.path()).unwrap();

    let err = source.fetch("missing").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::DocumentNotFound);

    fs::create_dir(dir.path().join("folder")).unwrap();
    let err = source.fetch("folder").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::DocumentNotFound);
}

#[tokio::test]
async fn directory_source_refuses_to_escape_the_library() {
    let outer = tempdir().unwrap();
    let library = outer.path().join("library");
    fs::create_dir(&library).unwrap();
    fs::write(outer.path().join("secret.json"), HARBOR).unwrap();

    let source = DirectorySource::new(&library).unwrap();
    let err = source.fetch("../secret").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::DocumentNotFound);
}

#[test]
fn directory_source_lists_documents() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("harbor.json"), HARBOR).unwrap();
    fs::write(dir.path().join("frontier.json"), FRONTIER).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

    let source = DirectorySource::new(dir.path()).unwrap();
    assert_eq!(source.list().unwrap(), vec!["frontier", "harbor"]);
}

#[test]
fn directory_source_requires_an_existing_directory() {
    let dir = tempdir().unwrap();
    assert!(DirectorySource::new(dir.path().join("nope")).is_err());

    let file = dir.path().join("file.json");
    fs::write(&file, HARBOR).unwrap();
    assert!(DirectorySource::new(&file).is_err());
}

#[tokio::test]
async fn session_loads_from_directory_and_navigates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("harbor.json"), HARBOR).unwrap();
    let source = DirectorySource::new(dir.path()).unwrap();

    let mut session = Session::new(Arc::new(MemoryStateStore::new()));
    let outcome = session.load_with(&source, "harbor").await.unwrap();
    assert_eq!(outcome, LoadOutcome::Applied);

    for _ in 0..5 {
        session.apply(Command::Move { delta: 1 });
    }
    let view = session.view().unwrap();
    assert_eq!(view.selected_index(), Some(1));
    assert_eq!(view.detail.unwrap().title, "Cards");
}

#[tokio::test]
async fn slow_first_load_is_discarded_when_a_second_load_finishes_first() {
    let source = Arc::new(MemorySource::new());
    source.insert_delayed("harbor", HARBOR, Duration::from_millis(100));
    source.insert("frontier", FRONTIER);

    let mut session = Session::new(Arc::new(MemoryStateStore::new()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    for id in ["harbor", "frontier"] {
        let ticket = session.begin_load(id);
        let source = Arc::clone(&source);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = fetch_document(source.as_ref(), ticket.document_id()).await;
            let _ = tx.send((ticket, result));
        });
    }
    drop(tx);

    let mut outcomes = Vec::new();
    while let Some((ticket, result)) = rx.recv().await {
        let id = ticket.document_id().to_owned();
        outcomes.push((id, session.complete_load(ticket, result).unwrap()));
    }

    assert_eq!(
        outcomes,
        vec![
            ("frontier".to_string(), LoadOutcome::Applied),
            ("harbor".to_string(), LoadOutcome::Discarded),
        ]
    );
    assert_eq!(session.active().unwrap().document.info().title, "Frontier");
}

#[tokio::test]
async fn memory_source_forgets_removed_documents() {
    let source = MemorySource::new();
    source.insert("harbor", HARBOR);
    assert!(source.fetch("harbor").await.is_ok());
    assert!(source.remove("harbor"));
    let err = source.fetch("harbor").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::DocumentNotFound);
}
