//! # Configuration Tree
//!
//! Load tests are described by an XML document. The document is parsed once
//! with `roxmltree` and copied into an owned [`ConfigNode`] tree so that it can
//! be shared read-only between farmer threads.
//!
//! Element and attribute names are compared ASCII case-insensitively.
//! Attribute values and text content are compared exactly.
//!
//! ## Lookup Contract
//!
//! - [`ConfigTree::find_root`]: the document element
//! - [`ConfigNode::find_child`]: first direct child with a given name
//! - [`ConfigNode::find_child_matching`]: first node under a path whose named
//!   child carries a given text value (e.g. the `<profile>` whose `<name>` is `RR`)
//! - [`ConfigNode::count_children`]: number of direct children with a given name

use crate::error::{FloodError, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Configuration format version understood by this build.
pub const CONFIG_VERSION: &str = "1";

/// Element and attribute names of the configuration schema.
pub mod schema {
    pub const ROOT_VERSION: &str = "configversion";
    pub const SEED: &str = "seed";
    pub const NAME: &str = "name";

    pub const FARM: &str = "farm";
    pub const FARM_USEFARMER: &str = "usefarmer";
    pub const FARM_USEFARMER_COUNT: &str = "count";

    pub const FARMER: &str = "farmer";
    pub const FARMER_COUNT: &str = "count";
    pub const FARMER_TIME: &str = "time";
    pub const FARMER_USEPROFILE: &str = "useprofile";

    pub const PROFILE: &str = "profile";
    pub const PROFILE_COUNT: &str = "count";
    pub const PROFILE_USEURLLIST: &str = "useurllist";
    pub const PROFILE_TYPE: &str = "profiletype";
    pub const PROFILE_SOCKET: &str = "socket";
    pub const PROFILE_REPORT: &str = "report";
    pub const PROFILE_REPORT_FORMAT: &str = "report_format";

    pub const URLLIST: &str = "urllist";
    pub const URLLIST_BASEURL: &str = "baseurl";
    pub const URLLIST_PROXYURL: &str = "proxyurl";
    pub const URLLIST_SUBSTFILE: &str = "substfile";
    pub const URLLIST_SUBSTFILE_VARIABLE: &str = "variable";
    pub const URLLIST_URL: &str = "url";
    pub const URLLIST_SEQUENCE: &str = "sequence";
    pub const URLLIST_SEQUENCE_NAME: &str = "sequencename";
    pub const URLLIST_SEQUENCE_LIST: &str = "sequencelist";

    pub const URL_METHOD: &str = "method";
    pub const URL_PAYLOAD: &str = "payload";
    pub const URL_PAYLOAD_FILE: &str = "payloadfile";
    pub const URL_PAYLOAD_TEMPLATE: &str = "payloadtemplate";
    pub const URL_CONTENT_TYPE: &str = "contenttype";
    pub const URL_EXTRA_HEADERS: &str = "extraheaders";
    pub const URL_PREDELAY: &str = "predelay";
    pub const URL_PREDELAY_PRECISION: &str = "predelayprecision";
    pub const URL_POSTDELAY: &str = "postdelay";
    pub const URL_POSTDELAY_PRECISION: &str = "postdelayprecision";
    pub const URL_REQUEST_TEMPLATE: &str = "requesttemplate";
    pub const URL_RESPONSE_TEMPLATE: &str = "responsetemplate";
    pub const URL_RESPONSE_SCRIPT: &str = "responsescript";
    pub const URL_RESPONSE_NAME: &str = "responsename";
    pub const URL_USER: &str = "user";
    pub const URL_PASSWORD: &str = "password";
}

/// One element of the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Create an empty element; mostly useful for building trees in tests.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this element has the given name, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Value of the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    /// Direct children with the given name, in document order.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a ConfigNode> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |child| child.is(name))
    }

    /// First direct child with the given name.
    pub fn find_child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|child| child.is(name))
    }

    /// First direct child with the given name, or a `MissingNode` error.
    pub fn require_child(&self, name: &str) -> Result<&ConfigNode> {
        self.find_child(name)
            .ok_or_else(|| FloodError::missing(name, format!("inside <{}>", self.name)))
    }

    /// Number of direct children with the given name.
    pub fn count_children(&self, name: &str) -> usize {
        self.children_named(name).count()
    }

    /// Find the first node reached through `path` whose `child_name` child
    /// has text equal to `child_value`.
    ///
    /// `path` is a `/`-separated list of element names relative to this node,
    /// so `find_child_matching("profile", "name", "RR")` on the root returns the
    /// profile named `RR`.
    pub fn find_child_matching(
        &self,
        path: &str,
        child_name: &str,
        child_value: &str,
    ) -> Option<&ConfigNode> {
        let mut candidates: Vec<&ConfigNode> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            candidates = candidates
                .into_iter()
                .flat_map(|node| node.children.iter().filter(|child| child.is(segment)))
                .collect();
        }

        candidates.into_iter().find(|node| {
            node.children
                .iter()
                .any(|child| child.is(child_name) && child.text() == child_value)
        })
    }

    /// Text of the first child with the given name, if the child exists.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.find_child(name).map(ConfigNode::text)
    }

    /// Parse the text of the named child.
    ///
    /// A missing child yields `Ok(None)`. An empty child also yields `Ok(None)`
    /// with a warning, matching how the engine treats `<count/>`.
    pub fn parse_child<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        let Some(child) = self.find_child(name) else {
            return Ok(None);
        };
        let text = child.text();
        if text.is_empty() {
            warn!("<{}> has element <{}> with no value, ignoring it", self.name, name);
            return Ok(None);
        }
        text.parse::<T>()
            .map(Some)
            .map_err(|_| FloodError::invalid(format!("<{}>/<{}>", self.name, name), text))
    }

    /// Parse the named attribute.
    pub fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attribute(name) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| FloodError::invalid(format!("<{}> attribute '{}'", self.name, name), value)),
        }
    }
}

/// A parsed configuration document.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: ConfigNode,
}

impl ConfigTree {
    /// Parse a configuration document from XML text.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = true;

        let document = roxmltree::Document::parse_with_options(xml, options)
            .map_err(|e| FloodError::Config(format!("unable to parse configuration: {}", e)))?;

        let root = copy_element(document.root_element());
        debug!("Parsed configuration rooted at <{}>", root.name);
        Ok(Self { root })
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse(&xml)
    }

    /// Wrap an already built node tree.
    pub fn from_root(root: ConfigNode) -> Self {
        Self { root }
    }

    pub fn find_root(&self) -> &ConfigNode {
        &self.root
    }

    /// Compare the document's format version with [`CONFIG_VERSION`].
    ///
    /// Returns `false` and logs a warning on mismatch; a mismatch never aborts.
    pub fn check_version(&self) -> bool {
        match self.root.attribute(schema::ROOT_VERSION) {
            Some(version) if version.trim() == CONFIG_VERSION => true,
            Some(version) => {
                warn!(
                    "Configuration format version '{}' does not match engine version '{}'",
                    version, CONFIG_VERSION
                );
                false
            }
            None => {
                warn!(
                    "Configuration does not declare '{}', assuming '{}'",
                    schema::ROOT_VERSION,
                    CONFIG_VERSION
                );
                false
            }
        }
    }

    /// Optional `<seed>` for reproducible random values.
    pub fn seed(&self) -> Result<Option<u64>> {
        self.root.parse_child::<u64>(schema::SEED)
    }
}

fn copy_element(node: roxmltree::Node<'_, '_>) -> ConfigNode {
    let mut element = ConfigNode::new(node.tag_name().name());

    for attribute in node.attributes() {
        element
            .attributes
            .push((attribute.name().to_string(), attribute.value().to_string()));
    }

    for child in node.children() {
        if child.is_element() {
            element.children.push(copy_element(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.text.push_str(text);
            }
        }
    }

    element
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<flood configversion="1">
  <seed>7</seed>
  <urllist>
    <name>Hosts</name>
    <url method="POST" payload="a=1">http://localhost/one</url>
    <url>http://localhost/<![CDATA[two]]></url>
  </urllist>
  <profile><name>Other</name></profile>
  <profile>
    <name>RR</name>
    <count>  3 </count>
    <Empty></Empty>
  </profile>
</flood>"#;

    #[test]
    fn test_parse_and_lookup() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let root = tree.find_root();
        assert!(root.is("FLOOD"));
        assert!(tree.check_version());
        assert_eq!(tree.seed().unwrap(), Some(7));

        let list = root.find_child("URLLIST").unwrap();
        assert_eq!(list.count_children("url"), 2);
        let first = list.find_child("url").unwrap();
        assert_eq!(first.attribute("METHOD"), Some("POST"));
        assert_eq!(first.text(), "http://localhost/one");
        let second = list.children_named("url").nth(1).unwrap();
        assert_eq!(second.text(), "http://localhost/two");
    }

    #[test]
    fn test_find_child_matching() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let root = tree.find_root();

        let profile = root.find_child_matching("profile", "name", "RR").unwrap();
        assert_eq!(profile.parse_child::<u32>("count").unwrap(), Some(3));
        assert!(root.find_child_matching("profile", "name", "rr").is_none());
        assert!(root.find_child_matching("farm", "name", "RR").is_none());
    }

    #[test]
    fn test_lookup_outlives_query_strings() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let root = tree.find_root();

        let (profile, urls) = {
            let path = String::from("profile");
            let wanted = format!("{}{}", "R", "R");
            let element = String::from("url");
            let list = root.find_child("urllist").unwrap();
            let urls: Vec<&ConfigNode> = list.children_named(&element).collect();
            (root.find_child_matching(&path, "name", &wanted).unwrap(), urls)
        };
        assert_eq!(profile.child_text("name"), Some("RR"));
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_typed_helpers() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let profile = tree.find_root().find_child_matching("profile", "name", "RR").unwrap();
        assert_eq!(profile.parse_child::<u32>("empty").unwrap(), None);
        assert_eq!(profile.parse_child::<u32>("missing").unwrap(), None);
        assert!(profile.parse_child::<u32>("name").is_err());
        assert!(matches!(
            profile.require_child("useurllist"),
            Err(FloodError::MissingNode { .. })
        ));
    }

    #[test]
    fn test_version_mismatch_is_not_fatal() {
        let tree = ConfigTree::parse(r#"<flood configversion="2"/>"#).unwrap();
        assert!(!tree.check_version());
        assert_eq!(tree.seed().unwrap(), None);
    }

    #[test]
    fn test_invalid_xml_is_config_error() {
        assert!(matches!(
            ConfigTree::parse("<flood>"),
            Err(FloodError::Config(_))
        ));
    }

    #[test]
    fn test_builder_nodes() {
        let node = ConfigNode::new("url")
            .with_attribute("method", "HEAD")
            .with_text(" /x ");
        assert_eq!(node.parse_attribute::<String>("method").unwrap().as_deref(), Some("HEAD"));
        assert_eq!(node.text(), "/x");
        let parent = ConfigNode::new("urllist").with_child(node);
        assert_eq!(parent.count_children("URL"), 1);
    }
}
