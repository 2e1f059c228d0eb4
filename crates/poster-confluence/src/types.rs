//! Confluence REST API types.

use serde::Deserialize;

/// Content returned by `/rest/api/content`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Page {
    pub id: String,
    pub title: String,
    pub version: Version,
    /// Root first, direct parent last. Only present when expanded.
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
    #[serde(default)]
    pub space: Option<Space>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Version {
    pub number: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Ancestor {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Space {
    pub key: String,
}

/// Search result envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct PageList {
    pub results: Vec<Page>,
}

/// A page as it exists on the server after an upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePage {
    pub id: String,
    pub title: String,
    pub space_key: String,
    /// Direct parent page, if known.
    pub ancestor_id: Option<String>,
    pub version: u32,
}

impl RemotePage {
    /// Build from an API page, falling back to `space_key` when the response
    /// does not expand the space.
    pub(crate) fn from_page(page: Page, space_key: &str) -> Self {
        Self {
            ancestor_id: page.ancestors.last().map(|a| a.id.clone()),
            space_key: page
                .space
                .map_or_else(|| space_key.to_owned(), |space| space.key),
            id: page.id,
            title: page.title,
            version: page.version.number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_from_search_result() {
        let json = r#"{
            "results": [{
                "id": "42",
                "type": "page",
                "status": "current",
                "title": "Guide",
                "version": {"number": 7, "minorEdit": false},
                "ancestors": [{"id": "1"}, {"id": "9"}],
                "space": {"key": "ENG"},
                "_links": {"webui": "/display/ENG/Guide"}
            }],
            "size": 1
        }"#;

        let list: PageList = serde_json::from_str(json).unwrap();
        let page = RemotePage::from_page(list.results.into_iter().next().unwrap(), "OTHER");

        assert_eq!(
            page,
            RemotePage {
                id: "42".to_owned(),
                title: "Guide".to_owned(),
                space_key: "ENG".to_owned(),
                ancestor_id: Some("9".to_owned()),
                version: 7,
            }
        );
    }

    #[test]
    fn test_page_without_expansions() {
        let page: Page =
            serde_json::from_str(r#"{"id": "5", "title": "T", "version": {"number": 1}}"#).unwrap();
        let page = RemotePage::from_page(page, "ENG");
        assert_eq!(page.space_key, "ENG");
        assert_eq!(page.ancestor_id, None);
    }
}
