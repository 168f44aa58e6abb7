//! Portfolio editor mutation API.
//!
//! Each action builds a complete new sequence from the current snapshot and
//! hands it to the reconciler's save path, never a partial patch. The
//! editor is the only local-mutation writer to the portfolio store.

use std::sync::Arc;

use thiserror::Error;

use smile_portfolio::{allocate_id, embed_bytes, ImageError, PortfolioId, PortfolioItem};
use smile_sync::{SaveOutcome, SyncReconciler};

/// Errors raised at the editor boundary, before any store operation.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Title and Image are required!")]
    MissingRequiredFields,

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// A new item as entered in the admin form, before an id is assigned.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub title: String,
    pub subtitle: String,
    pub img: String,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            img: String::new(),
        }
    }

    /// Attach uploaded bytes as an embedded image. Oversized uploads are
    /// rejected here, before the draft can ever reach the store.
    pub fn attach_upload(&mut self, bytes: &[u8], mime: &str) -> Result<(), ImageError> {
        self.img = embed_bytes(bytes, mime)?;
        Ok(())
    }

    /// Link an external image URL instead of an upload.
    pub fn link_image(&mut self, url: impl Into<String>) {
        self.img = url.into();
    }
}

/// Issues mutation intents to the portfolio store through the reconciler.
pub struct PortfolioEditor {
    reconciler: Arc<SyncReconciler>,
}

impl PortfolioEditor {
    pub fn new(reconciler: Arc<SyncReconciler>) -> Self {
        Self { reconciler }
    }

    /// Current snapshot of the portfolio.
    pub fn items(&self) -> Vec<PortfolioItem> {
        self.reconciler.store().get()
    }

    /// Add a new item from a draft. Requires a title and an image.
    pub async fn add(&self, draft: ItemDraft) -> Result<SaveOutcome, EditorError> {
        if draft.title.is_empty() || draft.img.is_empty() {
            return Err(EditorError::MissingRequiredFields);
        }
        let mut items = self.items();
        let item = PortfolioItem::new(allocate_id(&items), draft.title, draft.subtitle, draft.img);
        items.push(item);
        Ok(self.reconciler.save(items).await)
    }

    /// Retitle an item.
    pub async fn set_title(&self, id: PortfolioId, title: impl Into<String>) -> SaveOutcome {
        let title = title.into();
        self.amend(id, |item| item.title = title.clone()).await
    }

    /// Change an item's subtitle.
    pub async fn set_subtitle(&self, id: PortfolioId, subtitle: impl Into<String>) -> SaveOutcome {
        let subtitle = subtitle.into();
        self.amend(id, |item| item.subtitle = subtitle.clone()).await
    }

    /// Point an item's image at an external URL.
    pub async fn set_image_url(&self, id: PortfolioId, url: impl Into<String>) -> SaveOutcome {
        let url = url.into();
        self.amend(id, |item| item.img = url.clone()).await
    }

    /// Replace an item's image with uploaded bytes. An oversized upload is
    /// rejected before the store or the remote write sees anything.
    pub async fn replace_image_upload(
        &self,
        id: PortfolioId,
        bytes: &[u8],
        mime: &str,
    ) -> Result<SaveOutcome, EditorError> {
        let img = embed_bytes(bytes, mime)?;
        Ok(self.amend(id, |item| item.img = img.clone()).await)
    }

    /// Remove the item with the given id, leaving the relative order of the
    /// rest unchanged.
    pub async fn delete(&self, id: PortfolioId) -> SaveOutcome {
        let mut items = self.items();
        items.retain(|item| item.id != id);
        self.reconciler.save(items).await
    }

    async fn amend(&self, id: PortfolioId, mut change: impl FnMut(&mut PortfolioItem)) -> SaveOutcome {
        let items = self
            .items()
            .into_iter()
            .map(|mut item| {
                if item.id == id {
                    change(&mut item);
                }
                item
            })
            .collect();
        self.reconciler.save(items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use smile_portfolio::{PortfolioStore, MAX_EMBEDDED_BYTES};
    use smile_sync::{MemoryDocumentStore, StaticIdentityService};

    fn local_editor() -> PortfolioEditor {
        let store = Arc::new(PortfolioStore::new());
        PortfolioEditor::new(SyncReconciler::local_only(store))
    }

    async fn live_editor() -> (PortfolioEditor, Arc<MemoryDocumentStore>) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let reconciler = SyncReconciler::new(Arc::new(PortfolioStore::new()), documents.clone());
        reconciler
            .connect(&StaticIdentityService::signed_in("anon"))
            .await;
        (PortfolioEditor::new(reconciler), documents)
    }

    fn draft() -> ItemDraft {
        let mut draft = ItemDraft::new("Bonding", "Repair");
        draft.link_image("https://example.com/bonding.jpg");
        draft
    }

    #[tokio::test]
    async fn add_appends_with_a_fresh_id() {
        let editor = local_editor();
        let outcome = editor.add(draft()).await.unwrap();
        assert!(outcome.is_local_only());

        let items = editor.items();
        assert_eq!(items.len(), 7);
        let added = items.last().unwrap();
        assert_eq!(added.title, "Bonding");
        assert_eq!(
            items.iter().filter(|i| i.id == added.id).count(),
            1,
            "new id must be unique"
        );
    }

    #[tokio::test]
    async fn add_requires_title_and_image() {
        let editor = local_editor();

        let mut untitled = draft();
        untitled.title.clear();
        assert!(matches!(
            editor.add(untitled).await,
            Err(EditorError::MissingRequiredFields)
        ));

        let imageless = ItemDraft::new("Bonding", "Repair");
        assert!(matches!(
            editor.add(imageless).await,
            Err(EditorError::MissingRequiredFields)
        ));

        assert_eq!(editor.items().len(), 6);
    }

    #[tokio::test]
    async fn oversized_upload_never_reaches_the_store() {
        let (editor, documents) = live_editor().await;
        let before = editor.items();

        let mut draft = ItemDraft::new("Bonding", "Repair");
        let oversized = vec![0u8; MAX_EMBEDDED_BYTES + 1];
        assert!(draft.attach_upload(&oversized, "image/jpeg").is_err());

        let err = editor
            .replace_image_upload(before[0].id, &oversized, "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::Image(ImageError::TooLarge { .. })));

        assert_eq!(editor.items(), before);
        assert!(documents.write_log().is_empty());
    }

    #[tokio::test]
    async fn accepted_upload_is_embedded_and_synced() {
        let (editor, documents) = live_editor().await;
        let id = editor.items()[0].id;

        let outcome = editor
            .replace_image_upload(id, b"tiny image bytes", "image/png")
            .await
            .unwrap();
        assert!(outcome.is_synced());

        let items = editor.items();
        assert!(items[0].has_embedded_image());
        assert_eq!(documents.write_log(), vec![items]);
    }

    #[tokio::test]
    async fn delete_removes_exactly_one_in_place() {
        let editor = local_editor();
        let before = editor.items();

        editor.delete(before[2].id).await;

        let after = editor.items();
        assert_eq!(after.len(), 5);
        let mut expected = before.clone();
        expected.remove(2);
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_changes_nothing() {
        let editor = local_editor();
        let before = editor.items();
        editor.delete(424242).await;
        assert_eq!(editor.items(), before);
    }

    #[tokio::test]
    async fn edits_touch_only_the_target_item() {
        let editor = local_editor();
        let before = editor.items();
        let id = before[1].id;

        editor.set_title(id, "Teeth Whitening").await;
        editor.set_subtitle(id, "Cosmetic").await;
        editor.set_image_url(id, "https://example.com/new.jpg").await;

        let after = editor.items();
        assert_eq!(after[1].title, "Teeth Whitening");
        assert_eq!(after[1].subtitle, "Cosmetic");
        assert_eq!(after[1].img, "https://example.com/new.jpg");
        for (index, item) in after.iter().enumerate() {
            if index != 1 {
                assert_eq!(*item, before[index]);
            }
        }
    }
}
