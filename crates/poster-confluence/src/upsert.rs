//! Create-or-update of one document as a child page.
//!
//! Pages are matched by title within the space. A document whose title is new
//! is created under the parent page; an existing page is replaced in place
//! and moved under the parent if needed. Running the same upload twice
//! therefore updates rather than duplicates.

use std::sync::OnceLock;

use poster_renderer::ProcessedDocument;
use tracing::{debug, info};

use crate::client::ConfluenceClient;
use crate::error::{ApiError, UpsertError};
use crate::transport::Transport;
use crate::types::{Page, RemotePage};

/// HTTP status Confluence answers when the submitted version is stale.
const CONFLICT: u16 = 409;

/// Extra update attempts after a version conflict.
const CONFLICT_RETRIES: u32 = 1;

/// What an upsert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

/// Result of a successful upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub page: RemotePage,
    pub action: UpsertAction,
    /// Whether the update hit a version conflict and was redone.
    pub conflict_retried: bool,
}

/// Publishes documents under one parent page.
///
/// The parent is looked up on first use and remembered for later documents.
/// A failed lookup is not remembered, so the next document tries again.
pub struct Upserter<'c, T> {
    client: &'c ConfluenceClient<T>,
    space_key: String,
    parent_title: String,
    parent_id: OnceLock<String>,
}

impl<'c, T: Transport> Upserter<'c, T> {
    pub fn new(
        client: &'c ConfluenceClient<T>,
        space_key: impl Into<String>,
        parent_title: impl Into<String>,
    ) -> Self {
        Self {
            client,
            space_key: space_key.into(),
            parent_title: parent_title.into(),
            parent_id: OnceLock::new(),
        }
    }

    /// Create or update the page for `document`.
    ///
    /// # Errors
    ///
    /// - [`UpsertError::ParentPageNotFound`] / [`UpsertError::AmbiguousParentPage`]
    ///   if the parent title does not name exactly one page
    /// - [`UpsertError::AmbiguousPage`] if several pages already carry the
    ///   document's title
    /// - [`UpsertError::TitleIsParent`] if the page with the document's title is
    ///   the parent page itself
    /// - [`UpsertError::UpdateConflict`] if the page keeps changing underneath
    /// - request errors from the API client
    pub fn upsert(&self, document: &ProcessedDocument) -> Result<UpsertOutcome, UpsertError> {
        let parent_id = self.parent_id()?;
        let title = document.title();

        let mut existing = self.client.find_pages(&self.space_key, title)?;
        if existing.len() > 1 {
            return Err(UpsertError::AmbiguousPage {
                space_key: self.space_key.clone(),
                title: title.to_owned(),
                count: existing.len(),
            });
        }

        let mut outcome = match existing.pop() {
            None => {
                let page = self.client.create_page(
                    &self.space_key,
                    title,
                    document.body().as_str(),
                    parent_id,
                )?;
                UpsertOutcome {
                    page: RemotePage::from_page(page, &self.space_key),
                    action: UpsertAction::Created,
                    conflict_retried: false,
                }
            }
            Some(page) if page.id == parent_id => {
                return Err(UpsertError::TitleIsParent {
                    space_key: self.space_key.clone(),
                    title: title.to_owned(),
                });
            }
            Some(page) => self.update(page, document, parent_id)?,
        };
        outcome
            .page
            .ancestor_id
            .get_or_insert_with(|| parent_id.to_owned());
        Ok(outcome)
    }

    /// Parent page id, resolved once per upserter.
    fn parent_id(&self) -> Result<&str, UpsertError> {
        if let Some(id) = self.parent_id.get() {
            return Ok(id);
        }

        let mut pages = self.client.find_pages(&self.space_key, &self.parent_title)?;
        if pages.len() > 1 {
            return Err(UpsertError::AmbiguousParentPage {
                space_key: self.space_key.clone(),
                title: self.parent_title.clone(),
                count: pages.len(),
            });
        }
        let page = pages.pop().ok_or_else(|| UpsertError::ParentPageNotFound {
            space_key: self.space_key.clone(),
            title: self.parent_title.clone(),
        })?;
        debug!(id = %page.id, title = %self.parent_title, "Resolved parent page");

        Ok(self.parent_id.get_or_init(|| page.id))
    }

    fn update(
        &self,
        page: Page,
        document: &ProcessedDocument,
        parent_id: &str,
    ) -> Result<UpsertOutcome, UpsertError> {
        let mut version = page.version.number;
        let mut conflicts = 0;
        loop {
            let result = self.client.update_page(
                &page.id,
                document.title(),
                document.body().as_str(),
                version,
                parent_id,
            );
            match result {
                Ok(updated) => {
                    return Ok(UpsertOutcome {
                        page: RemotePage::from_page(updated, &self.space_key),
                        action: UpsertAction::Updated,
                        conflict_retried: conflicts > 0,
                    });
                }
                Err(ApiError::Rejected { status, .. })
                    if status == CONFLICT && conflicts < CONFLICT_RETRIES =>
                {
                    conflicts += 1;
                    version = self.client.get_page(&page.id)?.version.number;
                    info!(
                        "Version conflict on page {}, retrying from version {}",
                        page.id, version
                    );
                }
                Err(ApiError::Rejected { status, .. }) if status == CONFLICT => {
                    return Err(UpsertError::UpdateConflict { page_id: page.id });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Publish a single document under `parent_title` in `space_key`.
///
/// Convenience wrapper over [`Upserter`] for one-off uploads.
///
/// # Errors
///
/// See [`Upserter::upsert`].
pub fn upsert<T: Transport>(
    client: &ConfluenceClient<T>,
    document: &ProcessedDocument,
    space_key: &str,
    parent_title: &str,
) -> Result<UpsertOutcome, UpsertError> {
    Upserter::new(client, space_key, parent_title).upsert(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::testing::{FakeConfluence, Scripted};
    use crate::transport::Method;
    use poster_renderer::convert;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::Duration;

    fn client(fake: &FakeConfluence) -> ConfluenceClient<&FakeConfluence> {
        ConfluenceClient::new(
            fake,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            },
        )
    }

    fn document(title: &str, markdown: &str) -> ProcessedDocument {
        ProcessedDocument::new(title, convert(markdown), PathBuf::from(format!("{title}.md")))
    }

    #[test]
    fn test_create_then_update() {
        let fake = FakeConfluence::new();
        let parent = fake.with_page("ENG", "Docs");
        let client = client(&fake);

        let created = upsert(&client, &document("Guide", "first"), "ENG", "Docs").unwrap();
        let updated = upsert(&client, &document("Guide", "second"), "ENG", "Docs").unwrap();

        assert_eq!(created.action, UpsertAction::Created);
        assert_eq!(created.page.version, 1);
        assert_eq!(created.page.ancestor_id.as_deref(), Some(parent.as_str()));
        assert_eq!(updated.action, UpsertAction::Updated);
        assert_eq!(updated.page.version, 2);
        assert_eq!(updated.page.id, created.page.id);
        assert!(!updated.conflict_retried);
        assert_eq!(fake.page(&created.page.id).unwrap().body, "<p>second</p>");
    }

    #[test]
    fn test_repeated_upsert_never_duplicates() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        let client = client(&fake);
        let doc = document("Guide", "same");

        for _ in 0..3 {
            upsert(&client, &doc, "ENG", "Docs").unwrap();
        }

        let pages = fake.pages_titled("Guide");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].version, 3);
        assert_eq!(fake.count_calls(Method::Post), 1);
    }

    #[test]
    fn test_missing_parent_writes_nothing() {
        let fake = FakeConfluence::new();
        fake.with_page("OPS", "Docs");

        let err = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap_err();

        assert!(matches!(
            err,
            UpsertError::ParentPageNotFound { ref space_key, ref title }
                if space_key == "ENG" && title == "Docs"
        ));
        assert_eq!(fake.count_calls(Method::Post), 0);
        assert_eq!(fake.count_calls(Method::Put), 0);
    }

    #[test]
    fn test_ambiguous_parent() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        fake.with_page("ENG", "Docs");

        let err = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap_err();

        assert!(matches!(err, UpsertError::AmbiguousParentPage { count: 2, .. }));
        assert_eq!(fake.count_calls(Method::Post), 0);
    }

    #[test]
    fn test_ambiguous_page() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        fake.with_page("ENG", "Guide");
        fake.with_page("ENG", "Guide");

        let err = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap_err();

        assert!(matches!(err, UpsertError::AmbiguousPage { count: 2, .. }));
        assert_eq!(fake.count_calls(Method::Put), 0);
    }

    #[test]
    fn test_document_titled_like_parent_is_refused() {
        let fake = FakeConfluence::new();
        let parent = fake.with_page("ENG", "Docs");

        let err = upsert(&client(&fake), &document("Docs", "clobber"), "ENG", "Docs").unwrap_err();

        assert!(matches!(
            err,
            UpsertError::TitleIsParent { ref space_key, ref title }
                if space_key == "ENG" && title == "Docs"
        ));
        assert_eq!(fake.count_calls(Method::Put), 0);
        assert_eq!(fake.count_calls(Method::Post), 0);
        let stored = fake.page(&parent).unwrap();
        assert_eq!(stored.body, "");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.ancestor_id, None);
    }

    #[test]
    fn test_single_conflict_retried_once() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        let id = fake.with_page("ENG", "Guide");
        fake.conflict_next_puts(1);

        let outcome = upsert(&client(&fake), &document("Guide", "body"), "ENG", "Docs").unwrap();

        assert!(outcome.conflict_retried);
        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.page.version, 3);
        assert_eq!(fake.count_calls(Method::Put), 2);
        assert_eq!(fake.page(&id).unwrap().body, "<p>body</p>");
        let refetches = fake
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::Get && c.path == format!("/content/{id}"))
            .count();
        assert_eq!(refetches, 1);
    }

    #[test]
    fn test_persistent_conflict() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        let id = fake.with_page("ENG", "Guide");
        fake.conflict_next_puts(2);

        let err = upsert(&client(&fake), &document("Guide", "body"), "ENG", "Docs").unwrap_err();

        assert!(matches!(err, UpsertError::UpdateConflict { ref page_id } if *page_id == id));
        assert_eq!(fake.count_calls(Method::Put), 2);
    }

    #[test]
    fn test_parent_resolved_once() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        let client = client(&fake);
        let upserter = Upserter::new(&client, "ENG", "Docs");

        upserter.upsert(&document("One", "1")).unwrap();
        upserter.upsert(&document("Two", "2")).unwrap();

        let parent_lookups = fake
            .calls()
            .into_iter()
            .filter(|c| c.query.contains(&("title".to_owned(), "Docs".to_owned())))
            .count();
        assert_eq!(parent_lookups, 1);
    }

    #[test]
    fn test_failed_parent_lookup_not_cached() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        fake.fail_next(Scripted::Status(401));
        let client = client(&fake);
        let upserter = Upserter::new(&client, "ENG", "Docs");

        let err = upserter.upsert(&document("One", "1")).unwrap_err();
        assert!(matches!(err, UpsertError::RequestRejected { status: 401, .. }));

        let outcome = upserter.upsert(&document("One", "1")).unwrap();
        assert_eq!(outcome.action, UpsertAction::Created);
    }

    #[test]
    fn test_transient_failures_retried_during_upsert() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        fake.fail_next(Scripted::Status(502));
        fake.fail_next(Scripted::Transient("connection reset".to_owned()));

        let outcome = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap();

        assert_eq!(outcome.action, UpsertAction::Created);
    }

    #[test]
    fn test_exhausted_retries() {
        let fake = FakeConfluence::new();
        for _ in 0..3 {
            fake.fail_next(Scripted::Status(503));
        }

        let err = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap_err();

        assert!(matches!(err, UpsertError::TransportExhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_client_error_not_retried() {
        let fake = FakeConfluence::new();
        fake.with_page("ENG", "Docs");
        fake.fail_next(Scripted::Status(400));

        let err = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap_err();

        assert!(matches!(err, UpsertError::RequestRejected { status: 400, .. }));
        assert_eq!(fake.calls().len(), 1);
    }

    #[test]
    fn test_existing_page_moved_under_parent() {
        let fake = FakeConfluence::new();
        let parent = fake.with_page("ENG", "Docs");
        let id = fake.with_page("ENG", "Guide");

        let outcome = upsert(&client(&fake), &document("Guide", "x"), "ENG", "Docs").unwrap();

        assert_eq!(outcome.page.ancestor_id.as_deref(), Some(parent.as_str()));
        assert_eq!(fake.page(&id).unwrap().ancestor_id, Some(parent));
    }
}
