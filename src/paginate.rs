//! Cursor pagination over GraphQL connections.

use std::fmt;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::DigestError,
    executor::{QueryExecutor, Transport, Variables},
};

/// Field path, below `data`, to an object in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPath(&'static [&'static str]);

impl ResultPath {
    pub const fn new(fields: &'static [&'static str]) -> Self {
        Self(fields)
    }

    pub fn locate<'a>(&self, response: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(response.get("data")?, |node, field| node.get(*field))
            .filter(|node| node.is_object())
    }

    pub fn locate_mut<'a>(&self, response: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = response.get_mut("data")?;
        for field in self.0 {
            node = node.get_mut(*field)?;
        }
        node.is_object().then_some(node)
    }

    /// Decodes the object at this path.
    pub fn decode<T: DeserializeOwned>(&self, response: &Value) -> Result<T, DigestError> {
        let node = self.locate(response).ok_or_else(|| self.missing())?;
        T::deserialize(node).map_err(|e| self.shape_error(e))
    }

    fn missing(&self) -> DigestError {
        self.shape_error("no object at this path")
    }

    fn shape_error(&self, message: impl fmt::Display) -> DigestError {
        DigestError::Shape {
            path: self.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ResultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl<T: Transport> QueryExecutor<T> {
    /// Follows every page of the connection at `path`.
    ///
    /// Returns the last raw response, with the connection's `nodes` emptied,
    /// and all nodes in the order they were fetched.
    pub async fn fetch_all<N>(
        &self,
        query: &str,
        path: ResultPath,
        variables: Variables,
    ) -> Result<(Value, Vec<N>), DigestError>
    where
        N: DeserializeOwned + Send,
    {
        self.fetch_all_until(query, path, variables, |_: &[N]| false)
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all), but stops without requesting
    /// further pages once `stop` returns true for the page just fetched.
    pub async fn fetch_all_until<N, F>(
        &self,
        query: &str,
        path: ResultPath,
        mut variables: Variables,
        stop: F,
    ) -> Result<(Value, Vec<N>), DigestError>
    where
        N: DeserializeOwned + Send,
        F: Fn(&[N]) -> bool + Send + Sync,
    {
        let mut all_nodes = Vec::new();
        let mut page_count = 0;

        loop {
            page_count += 1;
            let mut response = self.execute(query, &variables).await?;

            let (nodes, page_info) = {
                let connection = path.locate_mut(&mut response).ok_or_else(|| path.missing())?;
                let page_info: PageInfo = connection
                    .get("pageInfo")
                    .map(PageInfo::deserialize)
                    .transpose()
                    .map_err(|e| path.shape_error(e))?
                    .ok_or_else(|| path.shape_error("connection has no pageInfo"))?;
                let nodes = match connection.get_mut("nodes").map(Value::take) {
                    Some(nodes) => Vec::<N>::deserialize(nodes).map_err(|e| path.shape_error(e))?,
                    None => Vec::new(),
                };
                connection["nodes"] = Value::Array(Vec::new());
                (nodes, page_info)
            };

            debug!(
                path = %path,
                page = page_count,
                fetched = nodes.len(),
                has_next_page = page_info.has_next_page,
                "Fetched page"
            );

            let stop_here = stop(&nodes);
            all_nodes.extend(nodes);

            if !page_info.has_next_page || stop_here {
                return Ok((response, all_nodes));
            }

            match page_info.end_cursor {
                Some(cursor) => {
                    variables.insert("after".to_string(), Value::String(cursor));
                }
                None => {
                    warn!(path = %path, "Page claims more results but has no end cursor");
                    return Ok((response, all_nodes));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ISSUES: ResultPath = ResultPath::new(&["repository", "issues"]);

    #[test]
    fn locate_follows_fields_below_data() {
        let response = json!({"data": {"repository": {"issues": {"nodes": []}}}});
        assert!(ISSUES.locate(&response).is_some());
        assert_eq!(ISSUES.to_string(), "repository.issues");
    }

    #[test]
    fn locate_rejects_missing_and_null_objects() {
        assert!(ISSUES.locate(&json!({"data": {"repository": null}})).is_none());
        assert!(ISSUES.locate(&json!({"data": {"repository": {"issues": null}}})).is_none());
        assert!(ISSUES.locate(&json!({"repository": {"issues": {}}})).is_none());
    }

    #[test]
    fn decode_reports_shape_errors_with_path() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        let path = ResultPath::new(&["repository"]);
        let err = path
            .decode::<Named>(&json!({"data": {"repository": {"title": "x"}}}))
            .unwrap_err();
        assert!(matches!(err, DigestError::Shape { ref path, .. } if path == "repository"));
    }
}
