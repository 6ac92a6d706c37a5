//! Social posts projected from `SOCIAL_POST` pulses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use xhe_core::{hash_hex, now_millis, random_nonce, PulseType};
use xhe_store::{names, Store, StoreExt};

use crate::error::Result;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Ledger position the post was created at.
    pub pulse_index: u64,
    pub created: i64,
}

pub struct SocialService<S: Store> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
}

impl<S: Store> SocialService<S> {
    pub fn new(store: Arc<S>, ledger: Arc<Ledger<S>>) -> Self {
        Self { store, ledger }
    }

    /// Store a post and record a `SOCIAL_POST` pulse.
    ///
    /// `pulse_index` is read before the pulse is appended, so under
    /// concurrent appends it may be lower than the index the pulse lands at.
    pub async fn create_post(&self, author: &str, content: &str, reply_to: Option<&str>) -> Result<Post> {
        let now = now_millis();
        let post = Post {
            id: hash_hex(format!("{}:{}:{}:{}", author, content, now, random_nonce())),
            author: author.to_owned(),
            content: content.to_owned(),
            reply_to: reply_to.map(str::to_owned),
            pulse_index: self.ledger.next_index().await,
            created: now,
        };

        self.store.put_record(names::SOCIAL, &post).await?;
        self.ledger
            .append(
                PulseType::SOCIAL_POST,
                json!({ "postId": post.id, "author": post.author, "replyTo": post.reply_to }),
                None,
            )
            .await?;
        Ok(post)
    }

    /// Top-level posts, newest first.
    pub async fn posts(&self, limit: usize) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .all()
            .await?
            .into_iter()
            .filter(|p| p.reply_to.is_none())
            .collect();
        newest_first(&mut posts);
        posts.truncate(limit);
        Ok(posts)
    }

    /// Replies to `post_id`, oldest first.
    pub async fn replies(&self, post_id: &str) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .all()
            .await?
            .into_iter()
            .filter(|p| p.reply_to.as_deref() == Some(post_id))
            .collect();
        posts.sort_by_key(|p| (p.created, p.pulse_index));
        Ok(posts)
    }

    /// Everything by `author`, newest first.
    pub async fn posts_by_author(&self, author: &str) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .all()
            .await?
            .into_iter()
            .filter(|p| p.author == author)
            .collect();
        newest_first(&mut posts);
        Ok(posts)
    }

    async fn all(&self) -> Result<Vec<Post>> {
        Ok(self.store.get_all_records(names::SOCIAL).await?)
    }
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| (b.created, b.pulse_index).cmp(&(a.created, a.pulse_index)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventDispatcher;
    use xhe_store::MemoryStore;

    async fn social() -> (Arc<Ledger<MemoryStore>>, SocialService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(
            Ledger::open(store.clone(), Arc::new(EventDispatcher::new()))
                .await
                .unwrap(),
        );
        (ledger.clone(), SocialService::new(store, ledger))
    }

    #[tokio::test]
    async fn test_create_post_records_pulse() {
        let (ledger, social) = social().await;
        let post = social.create_post("did:xhe:a", "hello", None).await.unwrap();

        assert_eq!(post.pulse_index, 0);
        let pulse = &ledger.ordered().await.unwrap()[0];
        assert_eq!(pulse.kind, PulseType::SOCIAL_POST);
        assert_eq!(pulse.payload["postId"], post.id.as_str());
        assert!(pulse.payload["replyTo"].is_null());
    }

    #[tokio::test]
    async fn test_threads() {
        let (_, social) = social().await;
        let root = social.create_post("did:xhe:a", "root", None).await.unwrap();
        let r1 = social.create_post("did:xhe:b", "first", Some(&root.id)).await.unwrap();
        let r2 = social.create_post("did:xhe:a", "second", Some(&root.id)).await.unwrap();
        let other = social.create_post("did:xhe:b", "other", None).await.unwrap();

        let top: Vec<_> = social.posts(10).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(top, vec![other.id.clone(), root.id.clone()]);

        let replies: Vec<_> = social.replies(&root.id).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(replies, vec![r1.id.clone(), r2.id.clone()]);

        let by_a: Vec<_> = social
            .posts_by_author("did:xhe:a")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(by_a, vec![r2.id, root.id]);

        assert_eq!(social.posts(1).await.unwrap().len(), 1);
    }
}
