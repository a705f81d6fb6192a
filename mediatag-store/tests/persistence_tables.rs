//! The JSON and in-memory bundles behave the same through the trait objects
//! the daemon holds.

use mediatag_core::{MediaId, MediaInfo, TagId, TagLink};
use mediatag_store::{Persistence, StoreError, TagRecord};
use rstest::rstest;
use tempfile::TempDir;

fn media(id: u32, sub_path: &str, name: &str) -> MediaInfo {
    let mut info = MediaInfo::new(sub_path, name, "", format!("hash{id}"));
    info.id = MediaId(id);
    info
}

fn link(tag: u32, media: u32) -> TagLink {
    TagLink {
        tag_id: TagId(tag),
        media_id: MediaId(media),
    }
}

fn exercise(store: &Persistence) {
    store
        .tags
        .insert(&TagRecord {
            id: TagId(0),
            count: 2,
            name: "cat".into(),
        })
        .expect("insert tag");
    store
        .media
        .insert_batch(&[media(0, "a", "1.png"), media(1, "a", "2.png"), media(3, "b", "4.png")])
        .expect("insert media");
    store
        .links
        .insert_batch(&[link(0, 0), link(0, 1), link(0, 3)])
        .expect("insert links");

    let mut moved = media(1, "b", "2.png");
    moved.hash = "rehashed".into();
    store.media.update(&moved).expect("update media");
    store.links.remove_batch(&[(TagId(0), MediaId(3))]).expect("remove link");
    store.media.remove(MediaId(3)).expect("remove media");

    let all_media = store.media.get_all().expect("media");
    assert_eq!(all_media.len(), 2);
    assert_eq!(all_media[1].sub_path, "b");
    assert_eq!(all_media[1].hash, "rehashed");
    assert_eq!(store.links.get_all().expect("links"), vec![link(0, 0), link(0, 1)]);

    let err = store
        .tags
        .update(&TagRecord {
            id: TagId(5),
            count: 0,
            name: "ghost".into(),
        })
        .expect_err("missing row");
    assert!(matches!(err, StoreError::MissingRow { .. }));
}

#[rstest]
#[case::json(true)]
#[case::memory(false)]
fn bundle_crud(#[case] on_disk: bool) {
    let tmp = TempDir::new().expect("tempdir");
    let store = if on_disk {
        Persistence::open_json(&tmp.path().join("db")).expect("open")
    } else {
        Persistence::in_memory()
    };
    exercise(&store);
}

#[test]
fn json_bundle_reloads_sparse_ids() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("db");
    {
        let store = Persistence::open_json(&dir).expect("open");
        exercise(&store);
    }
    let store = Persistence::open_json(&dir).expect("reopen");
    let ids: Vec<MediaId> = store.media.get_all().expect("media").iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MediaId(0), MediaId(1)]);
    assert!(dir.join("tags.json").exists());
    assert!(dir.join("media.json").exists());
    assert!(dir.join("tag_links.json").exists());
}
