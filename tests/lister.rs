use anyhow::Result;
use ironbucket::io::cloud::{ErrorKind, FakeObjectIO};
use ironbucket::source::ObjectLister;
use std::sync::Arc;

fn store_with(keys: &[&str]) -> FakeObjectIO {
    let store = FakeObjectIO::new();
    for key in keys {
        store.put_object("bucket", key, b"x".to_vec());
    }
    store
}

#[test]
fn lists_lazily_one_page_at_a_time() -> Result<()> {
    let store = store_with(&["a", "b", "c", "d", "e"]);
    let lister = ObjectLister::new(Arc::new(store.clone()), "bucket", None, 2);

    let mut listing = lister.list(None);
    assert!(store.list_requests().is_empty());

    let first = listing.next().transpose()?.map(|s| s.key);
    assert_eq!(first.as_deref(), Some("a"));
    assert_eq!(store.list_requests().len(), 1);

    let rest: Vec<String> = listing.map(|s| s.map(|s| s.key)).collect::<Result<_, _>>()?;
    assert_eq!(rest, vec!["b", "c", "d", "e"]);
    assert_eq!(store.list_requests().len(), 3);
    Ok(())
}

#[test]
fn start_after_only_on_first_request() -> Result<()> {
    let store = store_with(&["a", "b", "c", "d", "e"]);
    let lister = ObjectLister::new(Arc::new(store.clone()), "bucket", None, 2);

    let keys: Vec<String> = lister
        .list(Some("a"))
        .map(|s| s.map(|s| s.key))
        .collect::<Result<_, _>>()?;
    assert_eq!(keys, vec!["b", "c", "d", "e"]);

    let requests = store.list_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].start_after.as_deref(), Some("a"));
    assert_eq!(requests[0].continuation_token, None);
    assert_eq!(requests[1].start_after, None);
    assert!(requests[1].continuation_token.is_some());
    Ok(())
}

#[test]
fn prefix_is_sent_with_every_request() -> Result<()> {
    let store = store_with(&["logs/1", "logs/2", "logs/3", "other/1"]);
    let lister = ObjectLister::new(Arc::new(store.clone()), "bucket", Some("logs/".into()), 2);

    let keys: Vec<String> = lister
        .list(None)
        .map(|s| s.map(|s| s.key))
        .collect::<Result<_, _>>()?;
    assert_eq!(keys, vec!["logs/1", "logs/2", "logs/3"]);
    assert!(
        store
            .list_requests()
            .iter()
            .all(|r| r.prefix.as_deref() == Some("logs/") && r.max_keys == 2)
    );
    Ok(())
}

#[test]
fn store_error_ends_the_listing() {
    let store = store_with(&["a", "b"]);
    store.fail_next_lists(1);
    let lister = ObjectLister::new(Arc::new(store.clone()), "bucket", None, 10);

    let mut listing = lister.list(None);
    let err = listing.next().and_then(Result::err).map(|e| e.kind);
    assert_eq!(err, Some(ErrorKind::Network));
    assert!(listing.next().is_none());
    assert_eq!(store.list_requests().len(), 1);
}

#[test]
fn fresh_listing_sees_new_objects() -> Result<()> {
    let store = store_with(&["a"]);
    let lister = ObjectLister::new(Arc::new(store.clone()), "bucket", None, 10);
    assert_eq!(lister.list(None).count(), 1);

    store.put_object("bucket", "b", b"y".to_vec());
    let keys: Vec<String> = lister
        .list(Some("a"))
        .map(|s| s.map(|s| s.key))
        .collect::<Result<_, _>>()?;
    assert_eq!(keys, vec!["b"]);
    Ok(())
}

#[test]
fn empty_bucket_yields_nothing() {
    let store = FakeObjectIO::new();
    store.put_object("bucket", "only", Vec::new());
    let lister = ObjectLister::new(Arc::new(store), "bucket", Some("missing/".into()), 5);
    assert!(lister.list(None).next().is_none());
}
