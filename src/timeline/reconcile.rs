//! Merging fetched pages into the known list.
//!
//! Everything here works on the flat, newest-first form of a timeline: thread
//! annotations and chain-anchor copies are stripped on the way in by [`flatten`]
//! and rebuilt afterwards by [`build_threads`](super::build_threads). Gap markers
//! are positional in that order and are the only annotation owned by this module.

use std::collections::HashSet;

use crate::error::InvariantViolation;
use crate::models::{Annotations, Post, PostId};

/// How a merge was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// The source has no posts at all
    Drained,
    /// Not enough data to reconcile; the fresh page replaced everything
    Replaced,
    /// The page overlapped the known list and was spliced on top of it
    Overlap {
        /// Known posts superseded by the page
        superseded: usize,
    },
    /// The page did not reach the known list; a gap marker separates them
    Gap,
    /// Older posts were added below the known list
    Appended {
        /// Posts that were not known yet
        added: usize,
    },
    /// A gap was filled completely
    GapClosed,
}

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    /// Newest-first posts, without thread annotations
    pub posts: Vec<Post>,
    /// Which rule applied
    pub kind: MergeKind,
}

impl Merged {
    const fn new(posts: Vec<Post>, kind: MergeKind) -> Self {
        Self { posts, kind }
    }
}

/// Check that a page honors the fetcher contract
pub fn validate_page(page: &[Post]) -> Result<(), InvariantViolation> {
    for pair in page.windows(2) {
        let (newer, older) = (&pair[0].id, &pair[1].id);
        if newer == older {
            return Err(InvariantViolation::DuplicateId(newer.clone()));
        }
        if newer < older {
            return Err(InvariantViolation::Unsorted {
                newer: newer.clone(),
                older: older.clone(),
            });
        }
    }

    Ok(())
}

/// Reduce a materialized list to its chronological form.
///
/// Drops chain-anchor copies and repeated ids, clears thread annotations and
/// orders posts newest first. Gap markers stay on their posts.
pub fn flatten(posts: &[Post]) -> Vec<Post> {
    let mut seen: HashSet<&PostId> = HashSet::with_capacity(posts.len());
    let mut flat: Vec<Post> = posts
        .iter()
        .filter(|post| !post.is_anchor_copy() && seen.insert(&post.id))
        .map(|post| {
            let annotations = post.annotations.without_thread();
            post.clone().with_annotations(annotations)
        })
        .collect();
    flat.sort_by(|a, b| b.id.cmp(&a.id));
    flat
}

/// Merge the newest page into the cached list
pub fn merge(cached: &[Post], fresh: Vec<Post>, page_size: usize) -> Result<Merged, InvariantViolation> {
    validate_page(&fresh)?;

    if fresh.is_empty() {
        return Ok(Merged::new(Vec::new(), MergeKind::Drained));
    }

    let mut fresh: Vec<Post> = fresh.into_iter().map(raw).collect();
    let cached = flatten(cached);

    if cached.len() < page_size || fresh.len() < page_size {
        return Ok(Merged::new(fresh, MergeKind::Replaced));
    }

    let last = fresh.len() - 1;
    let tail_id = fresh[last].id.clone();

    if let Some(p) = cached.iter().position(|post| post.id == tail_id) {
        let (superseded, older) = cached.split_at(p + 1);
        carry_gap_markers(superseded, &mut fresh);

        let mut posts = fresh;
        posts.extend_from_slice(older);

        tracing::debug!("Overlap at post {} ({} cached posts superseded)", tail_id, p + 1);
        return Ok(Merged::new(
            posts,
            MergeKind::Overlap {
                superseded: superseded.len(),
            },
        ));
    }

    fresh[last].annotations.has_unloaded_status = true;
    let posts = stack_with_gap(fresh, cached);

    tracing::debug!("No overlap below post {}, keeping a gap marker", tail_id);
    Ok(Merged::new(posts, MergeKind::Gap))
}

/// Add a page of older posts below the known list
pub fn extend(existing: &[Post], older: Vec<Post>) -> Result<Merged, InvariantViolation> {
    validate_page(&older)?;

    let mut posts = flatten(existing);
    let known: HashSet<PostId> = posts.iter().map(|post| post.id.clone()).collect();
    let before = posts.len();

    posts.extend(
        older
            .into_iter()
            .filter(|post| !known.contains(&post.id))
            .map(raw),
    );
    let added = posts.len() - before;

    Ok(Merged::new(posts, MergeKind::Appended { added }))
}

/// Fill the gap below `anchor` with a page of posts older than it.
///
/// Returns `None` when the anchor is no longer in the list.
pub fn fill_gap(
    existing: &[Post],
    anchor: &PostId,
    page: Vec<Post>,
    page_size: usize,
) -> Result<Option<Merged>, InvariantViolation> {
    validate_page(&page)?;

    let mut posts = flatten(existing);
    let Some(index) = posts.iter().position(|post| &post.id == anchor) else {
        return Ok(None);
    };
    let below = posts.split_off(index + 1);
    posts[index].annotations.has_unloaded_status = false;

    let above: HashSet<PostId> = posts.iter().map(|post| post.id.clone()).collect();
    let full_page = page.len() >= page_size;
    let mut page: Vec<Post> = page
        .into_iter()
        .filter(|post| !above.contains(&post.id))
        .map(raw)
        .collect();

    let Some(tail_id) = page.last().map(|post| post.id.clone()) else {
        posts.extend(below);
        return Ok(Some(Merged::new(posts, MergeKind::GapClosed)));
    };

    if let Some(q) = below.iter().position(|post| post.id == tail_id) {
        let (superseded, older) = below.split_at(q + 1);
        carry_gap_markers(superseded, &mut page);
        posts.extend(page);
        posts.extend_from_slice(older);
        return Ok(Some(Merged::new(
            posts,
            MergeKind::Overlap {
                superseded: superseded.len(),
            },
        )));
    }

    let kind = if full_page {
        let last = page.len() - 1;
        page[last].annotations.has_unloaded_status = true;
        MergeKind::Gap
    } else {
        MergeKind::GapClosed
    };
    posts.extend(stack_with_gap(page, below));

    Ok(Some(Merged::new(posts, kind)))
}

/// Strip whatever annotations a fetched post may carry
fn raw(post: Post) -> Post {
    post.with_annotations(Annotations::default())
}

/// Put `newer` on top of `older`, dropping older entries the page repeats.
///
/// Every marker already in `older` is kept: each one stands for its own gap.
fn stack_with_gap(mut newer: Vec<Post>, older: Vec<Post>) -> Vec<Post> {
    let repeated: HashSet<PostId> = newer.iter().map(|post| post.id.clone()).collect();
    let dropped: Vec<Post> = older
        .iter()
        .filter(|post| repeated.contains(&post.id))
        .cloned()
        .collect();
    if !dropped.is_empty() {
        tracing::warn!("Page partially overlaps known posts away from its tail; treating as a gap");
        carry_gap_markers(&dropped, &mut newer);
    }

    let mut posts = newer;
    posts.extend(older.into_iter().filter(|post| !repeated.contains(&post.id)));
    posts
}

/// Move gap markers from superseded posts onto their fresh counterparts
fn carry_gap_markers(superseded: &[Post], fresh: &mut [Post]) {
    let marked: HashSet<&PostId> = superseded
        .iter()
        .filter(|post| post.has_gap_below())
        .map(|post| &post.id)
        .collect();

    for post in fresh.iter_mut().filter(|post| marked.contains(&post.id)) {
        post.annotations.has_unloaded_status = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReplyChainType;
    use crate::timeline::build_threads;

    const N: usize = 3;

    fn page(ids: &[u32]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(id.to_string())).collect()
    }

    fn ids(posts: &[Post]) -> Vec<u32> {
        posts
            .iter()
            .map(|post| post.id.as_str().parse().unwrap())
            .collect()
    }

    fn gaps(posts: &[Post]) -> Vec<u32> {
        posts
            .iter()
            .filter(|post| post.has_gap_below())
            .map(|post| post.id.as_str().parse().unwrap())
            .collect()
    }

    fn reconcile(cached: &[Post], fresh: Vec<Post>) -> Vec<Post> {
        build_threads(merge(cached, fresh, N).unwrap().posts)
    }

    #[test]
    fn test_full_overlap_identical() {
        let merged = merge(&page(&[10, 9, 8, 7]), page(&[10, 9, 8, 7]), N).unwrap();
        assert_eq!(ids(&merged.posts), vec![10, 9, 8, 7]);
        assert_eq!(merged.kind, MergeKind::Overlap { superseded: 4 });
        assert!(gaps(&merged.posts).is_empty());
    }

    #[test]
    fn test_overlap_inside_full_page() {
        let result = reconcile(&page(&[10, 9, 8, 7]), page(&[10, 9, 8]));
        assert_eq!(ids(&result), vec![10, 9, 8, 7]);
    }

    #[test]
    fn test_short_fresh_page_replaces() {
        let merged = merge(&page(&[10, 9, 8, 7]), page(&[10, 9]), N).unwrap();
        assert_eq!(ids(&merged.posts), vec![10, 9]);
        assert_eq!(merged.kind, MergeKind::Replaced);
    }

    #[test]
    fn test_short_cache_replaces() {
        let merged = merge(&page(&[10, 9]), page(&[15, 14, 13]), N).unwrap();
        assert_eq!(ids(&merged.posts), vec![15, 14, 13]);
        assert_eq!(merged.kind, MergeKind::Replaced);
        assert!(gaps(&merged.posts).is_empty());
    }

    #[test]
    fn test_empty_page_drains() {
        let merged = merge(&page(&[10, 9, 8, 7]), Vec::new(), N).unwrap();
        assert!(merged.posts.is_empty());
        assert_eq!(merged.kind, MergeKind::Drained);
    }

    #[test]
    fn test_overlap_splices_older_history() {
        let cached = page(&[10, 9, 8, 7, 6]);
        let merged = merge(&cached, page(&[12, 11, 10]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![12, 11, 10, 9, 8, 7, 6]);
        assert_eq!(merged.kind, MergeKind::Overlap { superseded: 1 });
    }

    #[test]
    fn test_gap_is_marked_on_oldest_fresh_post() {
        let cached = page(&[10, 9, 8, 7, 6]);
        let merged = merge(&cached, page(&[15, 14, 13]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![15, 14, 13, 10, 9, 8, 7, 6]);
        assert_eq!(gaps(&merged.posts), vec![13]);
        assert_eq!(merged.kind, MergeKind::Gap);
    }

    #[test]
    fn test_repeated_refresh_keeps_single_marker() {
        let cached = page(&[10, 9, 8, 7, 6]);
        let fresh = page(&[15, 14, 13]);
        let first = reconcile(&cached, fresh.clone());
        let second = reconcile(&first, fresh);

        assert_eq!(second, first);
        assert_eq!(gaps(&second), vec![13]);
    }

    #[test]
    fn test_marker_carried_when_newer_posts_arrive() {
        let cached = reconcile(&page(&[10, 9, 8, 7, 6]), page(&[15, 14, 13]));
        let merged = merge(&cached, page(&[16, 15, 14]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![16, 15, 14, 13, 10, 9, 8, 7, 6]);
        assert_eq!(gaps(&merged.posts), vec![13]);
    }

    #[test]
    fn test_marker_carried_from_superseded_prefix() {
        let cached = reconcile(&page(&[10, 9, 8, 7, 6]), page(&[15, 14, 13]));
        let merged = merge(&cached, page(&[16, 13, 10]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![16, 13, 10, 9, 8, 7, 6]);
        assert_eq!(gaps(&merged.posts), vec![13]);
    }

    #[test]
    fn test_older_gap_survives_a_new_gap_above_it() {
        let mut cached = page(&[12, 11, 10, 9]);
        cached[0].annotations.has_unloaded_status = true;
        let merged = merge(&cached, page(&[20, 19, 18]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![20, 19, 18, 12, 11, 10, 9]);
        assert_eq!(gaps(&merged.posts), vec![18, 12]);
    }

    #[test]
    fn test_back_to_back_gaps_can_both_be_filled() {
        let first = merge(&page(&[3, 2, 1]), page(&[5]), 1).unwrap().posts;
        assert_eq!(gaps(&first), vec![5]);

        let second = merge(&first, page(&[6]), 1).unwrap().posts;
        assert_eq!(ids(&second), vec![6, 5, 3, 2, 1]);
        assert_eq!(gaps(&second), vec![6, 5]);

        let filled = fill_gap(&second, &PostId::from("5"), page(&[4, 3]), 1)
            .unwrap()
            .unwrap();
        assert_eq!(ids(&filled.posts), vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(gaps(&filled.posts), vec![6]);
    }

    #[test]
    fn test_partial_overlap_keeps_marker_of_repeated_post() {
        let mut cached = page(&[12, 11, 10, 9]);
        cached[0].annotations.has_unloaded_status = true;
        let merged = merge(&cached, page(&[20, 12, 5]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![20, 12, 5, 11, 10, 9]);
        assert_eq!(gaps(&merged.posts), vec![12, 5]);
    }

    #[test]
    fn test_partial_overlap_is_a_gap_without_duplicates() {
        let cached = page(&[12, 11, 10, 9]);
        let merged = merge(&cached, page(&[20, 12, 5]), N).unwrap();

        assert_eq!(ids(&merged.posts), vec![20, 12, 5, 11, 10, 9]);
        assert_eq!(gaps(&merged.posts), vec![5]);
        assert_eq!(merged.kind, MergeKind::Gap);
    }

    #[test]
    fn test_overlap_never_loses_older_history() {
        for size in 4..12u32 {
            let cached_ids: Vec<u32> = (1..=size).rev().collect();
            let cached = page(&cached_ids);
            for tail in 1..=size {
                let fresh = page(&[size + 2, size + 1, tail]);
                let merged = merge(&cached, fresh, N).unwrap();
                let merged_ids = ids(&merged.posts);

                for id in 1..tail {
                    let count = merged_ids.iter().filter(|&&m| m == id).count();
                    assert_eq!(count, 1, "post {id} with tail {tail} and size {size}");
                }
                assert!(gaps(&merged.posts).is_empty());
            }
        }
    }

    #[test]
    fn test_cached_thread_is_flattened_before_merge() {
        let mut cached = vec![
            Post::new("8"),
            Post::new("7").replying_to("5"),
            Post::new("6"),
            Post::new("5"),
            Post::new("4"),
        ];
        cached = build_threads(cached);
        assert_eq!(cached[1].annotations.reply_chain_type, ReplyChainType::Start);

        let merged = merge(&cached, page(&[9, 8, 7]), N).unwrap();
        assert_eq!(ids(&merged.posts), vec![9, 8, 7, 6, 5, 4]);
        assert!(
            merged
                .posts
                .iter()
                .all(|p| p.annotations.reply_chain_type == ReplyChainType::Null)
        );
    }

    #[test]
    fn test_unsorted_page_fails_loudly() {
        let err = merge(&page(&[10, 9, 8]), page(&[8, 9, 7]), N).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::Unsorted {
                newer: PostId::from("8"),
                older: PostId::from("9"),
            }
        );

        let err = validate_page(&page(&[9, 9])).unwrap_err();
        assert_eq!(err, InvariantViolation::DuplicateId(PostId::from("9")));
    }

    #[test]
    fn test_extend_appends_unknown_posts() {
        let merged = extend(&page(&[10, 9, 8]), page(&[8, 7, 6])).unwrap();
        assert_eq!(ids(&merged.posts), vec![10, 9, 8, 7, 6]);
        assert_eq!(merged.kind, MergeKind::Appended { added: 2 });
    }

    #[test]
    fn test_fill_gap_overlapping_below() {
        let list = reconcile(&page(&[10, 9, 8, 7, 6]), page(&[15, 14, 13]));
        let merged = fill_gap(&list, &PostId::from("13"), page(&[12, 11, 10]), N)
            .unwrap()
            .unwrap();

        assert_eq!(ids(&merged.posts), vec![15, 14, 13, 12, 11, 10, 9, 8, 7, 6]);
        assert!(gaps(&merged.posts).is_empty());
        assert_eq!(merged.kind, MergeKind::Overlap { superseded: 1 });
    }

    #[test]
    fn test_fill_gap_moves_marker_down() {
        let list = reconcile(&page(&[10, 9, 8, 7, 6]), page(&[20, 19, 18]));
        let merged = fill_gap(&list, &PostId::from("18"), page(&[17, 16, 15]), N)
            .unwrap()
            .unwrap();

        assert_eq!(
            ids(&merged.posts),
            vec![20, 19, 18, 17, 16, 15, 10, 9, 8, 7, 6]
        );
        assert_eq!(gaps(&merged.posts), vec![15]);
        assert_eq!(merged.kind, MergeKind::Gap);
    }

    #[test]
    fn test_fill_gap_short_page_closes() {
        let list = reconcile(&page(&[10, 9, 8, 7, 6]), page(&[20, 19, 18]));
        let merged = fill_gap(&list, &PostId::from("18"), page(&[17]), N)
            .unwrap()
            .unwrap();

        assert_eq!(ids(&merged.posts), vec![20, 19, 18, 17, 10, 9, 8, 7, 6]);
        assert!(gaps(&merged.posts).is_empty());
        assert_eq!(merged.kind, MergeKind::GapClosed);
    }

    #[test]
    fn test_fill_gap_unknown_anchor() {
        let list = page(&[10, 9, 8]);
        let result = fill_gap(&list, &PostId::from("42"), page(&[7]), N).unwrap();
        assert!(result.is_none());
    }
}
