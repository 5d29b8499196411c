//! Comment tree assembly for blog posts
//!
//! Threads are materialized to a fixed depth of three: top-level comments,
//! their replies, and replies to those. Each level is fetched with one
//! store call and sorted newest first. Anything nested deeper is not
//! returned; third-level nodes always carry an empty `replies` list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::blog::BlogComment;
use crate::models::users::AuthorProjection;
use crate::store::{CommunityStore, StoreResult};

/// Number of levels returned by [`assemble_comment_tree`]
pub const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: i32,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub author: AuthorProjection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at_display: String,
    pub updated_at_display: String,
    pub replies: Vec<CommentNode>,
}

/// Human-readable distance from `then` to `now`, e.g. `"5 minutes ago"`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let (amount, unit) = match seconds {
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    if amount == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{amount} {unit}s ago")
    }
}

fn ids(level: &[BlogComment]) -> Vec<i32> {
    level.iter().map(|comment| comment.id).collect()
}

/// Group a level by parent id, keeping the store's newest-first order.
fn by_parent(level: Vec<BlogComment>) -> HashMap<i32, Vec<BlogComment>> {
    let mut groups: HashMap<i32, Vec<BlogComment>> = HashMap::new();
    for comment in level {
        if let Some(parent_id) = comment.parent_id {
            groups.entry(parent_id).or_default().push(comment);
        }
    }
    groups
}

struct TreeBuilder {
    authors: HashMap<Uuid, AuthorProjection>,
    now: DateTime<Utc>,
}

impl TreeBuilder {
    fn node(&self, comment: BlogComment, replies: Vec<CommentNode>) -> Option<CommentNode> {
        // Comments cascade with their author, so a missing author means a
        // concurrent delete; drop the comment.
        let author = self.authors.get(&comment.user_id)?.clone();
        Some(CommentNode {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            content: comment.content,
            author,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            created_at_display: relative_time(comment.created_at, self.now),
            updated_at_display: relative_time(comment.updated_at, self.now),
            replies,
        })
    }
}

/// Build the three-level comment tree of a post.
pub async fn assemble_comment_tree(
    store: &dyn CommunityStore,
    post_id: i32,
    now: DateTime<Utc>,
) -> StoreResult<Vec<CommentNode>> {
    let roots = store.root_comments(post_id).await?;
    if roots.is_empty() {
        return Ok(Vec::new());
    }
    let replies: Vec<BlogComment> = store
        .replies_to(&ids(&roots))
        .await?
        .into_iter()
        .filter(|reply| reply.post_id == post_id)
        .collect();
    let nested: Vec<BlogComment> = if replies.is_empty() {
        Vec::new()
    } else {
        store
            .replies_to(&ids(&replies))
            .await?
            .into_iter()
            .filter(|reply| reply.post_id == post_id)
            .collect()
    };

    let author_ids: Vec<Uuid> = roots
        .iter()
        .chain(&replies)
        .chain(&nested)
        .map(|comment| comment.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let builder = TreeBuilder {
        authors: store
            .authors(&author_ids)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect(),
        now,
    };

    let mut nested = by_parent(nested);
    let mut replies: HashMap<i32, Vec<CommentNode>> = by_parent(replies)
        .into_iter()
        .map(|(parent_id, level)| {
            let nodes = level
                .into_iter()
                .filter_map(|reply| {
                    let leaves = nested
                        .remove(&reply.id)
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|leaf| builder.node(leaf, Vec::new()))
                        .collect();
                    builder.node(reply, leaves)
                })
                .collect();
            (parent_id, nodes)
        })
        .collect();

    Ok(roots
        .into_iter()
        .filter_map(|root| {
            let children = replies.remove(&root.id).unwrap_or_default();
            builder.node(root, children)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::User;
    use crate::roles::Role;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;

    fn at(minutes_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(minutes_ago)
    }

    fn comment(
        id: i32,
        parent_id: Option<i32>,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> BlogComment {
        BlogComment {
            id,
            post_id: 1,
            user_id,
            parent_id,
            content: format!("comment {id}"),
            is_approved: true,
            created_at,
            updated_at: created_at,
        }
    }

    async fn store_with_author(now: DateTime<Utc>) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert_user(User {
                id,
                name: "Linus".into(),
                email: "linus@example.com".into(),
                image: Some("https://example.com/l.png".into()),
                role: Role::User,
                created_at: now,
                updated_at: now,
            })
            .await;
        (store, id)
    }

    #[test]
    fn test_relative_time_phrases() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now + Duration::minutes(5), now), "just now");
        assert_eq!(relative_time(at(1, now), now), "1 minute ago");
        assert_eq!(relative_time(at(5, now), now), "5 minutes ago");
        assert_eq!(relative_time(at(60 * 3, now), now), "3 hours ago");
        assert_eq!(relative_time(at(60 * 24 * 2, now), now), "2 days ago");
        assert_eq!(relative_time(at(60 * 24 * 65, now), now), "2 months ago");
        assert_eq!(relative_time(at(60 * 24 * 400, now), now), "1 year ago");
    }

    #[tokio::test]
    async fn test_tree_is_three_levels_newest_first() {
        let now = Utc::now();
        let (store, author) = store_with_author(now).await;
        store.seed_comment(comment(1, None, author, at(30, now))).await;
        store.seed_comment(comment(2, None, author, at(10, now))).await;
        store.seed_comment(comment(3, Some(1), author, at(20, now))).await;
        store.seed_comment(comment(4, Some(1), author, at(5, now))).await;
        store.seed_comment(comment(5, Some(4), author, at(2, now))).await;
        store.seed_comment(comment(6, Some(5), author, at(1, now))).await;

        let tree = assemble_comment_tree(&store, 1, now).await.unwrap();

        assert_eq!(tree.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2, 1]);
        let first = &tree[1];
        assert_eq!(first.replies.iter().map(|n| n.id).collect::<Vec<_>>(), vec![4, 3]);
        let third = &first.replies[0].replies;
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].id, 5);
        // Comment 6 sits on the fourth level and is not materialized.
        assert!(third[0].replies.is_empty());

        assert_eq!(first.author.name, "Linus");
        assert_eq!(first.created_at_display, "30 minutes ago");
    }

    #[tokio::test]
    async fn test_unapproved_comments_are_hidden() {
        let now = Utc::now();
        let (store, author) = store_with_author(now).await;
        store.seed_comment(comment(1, None, author, at(3, now))).await;
        let mut hidden = comment(2, Some(1), author, at(2, now));
        hidden.is_approved = false;
        store.seed_comment(hidden).await;

        let tree = assemble_comment_tree(&store, 1, now).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[tokio::test]
    async fn test_post_without_comments_is_empty() {
        let store = MemoryStore::new();
        let tree = assemble_comment_tree(&store, 42, Utc::now()).await.unwrap();
        assert!(tree.is_empty());
        assert_eq!(store.mutation_count(), 0);
    }
}
