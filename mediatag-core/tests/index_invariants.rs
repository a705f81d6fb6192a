//! Invariants of the tag and media collections under long operation
//! sequences, and of the relationship sets kept on both sides.

use std::collections::{BTreeSet, HashSet};

use mediatag_core::{MediaId, MediaIndex, MediaInfo, QueryEngine, TagId, TagIndex};

/// Small deterministic generator so sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u32) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % u64::from(bound)) as u32
    }
}

fn assert_tag_invariants(tags: &TagIndex) {
    let mut names = HashSet::new();
    for tag in tags.get_all() {
        assert!((tag.id.0 as usize) < tags.capacity(), "id {} out of range", tag.id);
        assert!(!tags.is_free(tag.id), "live id {} marked free", tag.id);
        assert!(names.insert(tag.name.clone()), "duplicate name {}", tag.name);
        assert_eq!(tags.get_by_name(&tag.name).map(|t| t.id), Some(tag.id));
    }
}

fn assert_media_invariants(media: &MediaIndex) {
    let mut keys = HashSet::new();
    for m in media.get_all() {
        assert!((m.id().0 as usize) < media.capacity());
        assert!(!media.is_free(m.id()));
        assert!(keys.insert(m.info.sub_path_name()), "duplicate path");
        assert_eq!(media.id_by_path(&m.info.sub_path_name()), Some(m.id()));
    }
}

fn assert_links_symmetric(tags: &TagIndex, media: &MediaIndex) {
    for tag in tags.get_all() {
        for m in &tag.media_ids {
            let other = media.get(*m).expect("linked media is live");
            assert!(other.tag_ids.contains(&tag.id));
        }
    }
    for m in media.get_all() {
        for t in &m.tag_ids {
            let other = tags.get(*t).expect("linked tag is live");
            assert!(other.media_ids.contains(&m.id()));
        }
    }
}

#[test]
fn random_insert_remove_keeps_ids_compact() {
    let mut rng = Lcg(7);
    let mut tags = TagIndex::new();
    let mut serial = 0;
    let mut peak_live = 0;

    for _ in 0..2_000 {
        let live: Vec<TagId> = tags.get_all().map(|t| t.id).collect();
        if live.is_empty() || rng.next(3) > 0 {
            let lowest_free = (0..tags.capacity() as u32).map(TagId).find(|id| tags.is_free(*id));
            let id = tags.insert_new(&format!("tag-{serial}"));
            serial += 1;
            if lowest_free.is_some() {
                assert!((id.0 as usize) < tags.capacity());
            } else {
                assert_eq!(id.0 as usize, tags.capacity() - 1);
            }
        } else {
            let victim = live[rng.next(live.len() as u32) as usize];
            assert!(tags.remove(victim).is_some());
        }
        peak_live = peak_live.max(tags.len());
        assert!(tags.capacity() <= peak_live);
        assert_tag_invariants(&tags);
    }
}

#[test]
fn random_link_unlink_keeps_both_sides_equal() {
    let mut rng = Lcg(42);
    let mut tags = TagIndex::new();
    let mut media = MediaIndex::new();
    for i in 0..8 {
        tags.insert_new(&format!("t{i}"));
    }
    for i in 0..20 {
        media.insert_new(MediaInfo::new("dir", format!("f{i}.png"), "", format!("h{i}")));
    }

    for step in 0..3_000 {
        let t = TagId(rng.next(8));
        let m = MediaId(rng.next(20));
        match rng.next(4) {
            0 | 1 => {
                let a = tags.link(t, m);
                let b = media.link(m, t);
                assert_eq!(a, b, "step {step}");
            }
            2 => {
                let a = tags.unlink(t, m);
                let b = media.unlink(m, t);
                assert_eq!(a, b, "step {step}");
            }
            _ => {
                // Remove a media with its links, then put a fresh one in its slot.
                if let Some(removed) = media.remove(m) {
                    for t in &removed.tag_ids {
                        tags.unlink(*t, m);
                    }
                    let id = media.insert_new(MediaInfo::new("dir", format!("g{step}.png"), "", ""));
                    assert_eq!(id, m);
                }
            }
        }
        assert_links_symmetric(&tags, &media);
    }
    assert_media_invariants(&media);
}

#[test]
fn query_over_linked_indices_is_left_associative() {
    let mut tags = TagIndex::new();
    let mut media = MediaIndex::new();
    let ids: Vec<MediaId> = (1..=3)
        .map(|i| media.insert_new(MediaInfo::new("", format!("{i}.png"), "", "")))
        .collect();

    for (name, members) in [("A", &[0usize, 1][..]), ("B", &[1, 2]), ("C", &[1])] {
        let t = tags.insert_new(name);
        for idx in members {
            tags.link(t, ids[*idx]);
            media.link(ids[*idx], t);
        }
    }
    assert_links_symmetric(&tags, &media);

    let result = QueryEngine::run("A + B - C", &tags).expect("query evaluates");
    let expected: BTreeSet<MediaId> = [ids[0], ids[2]].into_iter().collect();
    assert_eq!(result.media_ids, expected);
    assert_eq!(result.tag_ids.len(), 3);

    assert!(QueryEngine::run("A + (B", &tags).is_err());
}
