//! # Round-Robin Profile
//!
//! Walks a flat list of URL entries in order, `count` times over. Sequences
//! are flattened when the profile starts; everything that depends on values
//! known only at request time (generated ids, substitution-file draws,
//! captured response values) is expanded when each request is built.

use super::cookies::CookieJar;
use super::script::run_capture_script;
use super::sequence;
use super::url::{Payload, UrlEntry};
use crate::config::{schema, ConfigTree};
use crate::context::RuntimeContext;
use crate::error::{FloodError, Result};
use crate::http::{ParsedUri, Request, Response};
use crate::params::{ExpandMode, ParamStore};
use regex::Regex;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct RoundRobinProfile {
    name: String,
    urls: Vec<UrlEntry>,
    current_url: usize,
    current_round: u64,
    execute_rounds: u64,
    cookies: CookieJar,
    params: ParamStore,
    base_url: Option<String>,
    proxy: Option<ParsedUri>,
}

impl RoundRobinProfile {
    /// Build the profile named `profile_name` and its URL list.
    pub fn init(ctx: &RuntimeContext, config: &ConfigTree, profile_name: &str) -> Result<Self> {
        let root = config.find_root();
        let profile = root
            .find_child_matching(schema::PROFILE, schema::NAME, profile_name)
            .ok_or_else(|| {
                FloodError::missing(schema::PROFILE, format!("no profile named '{}'", profile_name))
            })?;

        let execute_rounds = profile.parse_child::<u64>(schema::PROFILE_COUNT)?.unwrap_or(1);

        let urllist_name = profile
            .child_text(schema::PROFILE_USEURLLIST)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                FloodError::missing(
                    schema::PROFILE_USEURLLIST,
                    format!("profile '{}'", profile_name),
                )
            })?;

        let urllist = root
            .find_child_matching(schema::URLLIST, schema::NAME, urllist_name)
            .ok_or_else(|| {
                FloodError::missing(schema::URLLIST, format!("no urllist named '{}'", urllist_name))
            })?;

        let mut params = ParamStore::new(ctx.profile_rng());
        for subst in urllist.children_named(schema::URLLIST_SUBSTFILE) {
            let variable = subst
                .attribute(schema::URLLIST_SUBSTFILE_VARIABLE)
                .ok_or_else(|| {
                    FloodError::Config(format!(
                        "<{}> in urllist '{}' needs a '{}' attribute",
                        schema::URLLIST_SUBSTFILE,
                        urllist_name,
                        schema::URLLIST_SUBSTFILE_VARIABLE
                    ))
                })?;
            params.load_substitution_file(variable, Path::new(subst.text()))?;
        }

        let base_url = urllist
            .child_text(schema::URLLIST_BASEURL)
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string());

        let proxy = urllist
            .child_text(schema::URLLIST_PROXYURL)
            .filter(|url| !url.is_empty())
            .map(ParsedUri::parse)
            .transpose()?;

        let expanded = sequence::expand(urllist)?;
        if expanded.is_empty() {
            return Err(FloodError::Config(format!(
                "urllist '{}' doesn't have any urls",
                urllist_name
            )));
        }

        let mut urls = Vec::with_capacity(expanded.len());
        for item in expanded {
            for (name, value) in &item.bindings {
                params.set(name.as_str(), value.as_str());
            }
            let mut entry = UrlEntry::from_node(item.node)?;
            entry.bind_sequence_variables(&mut params);
            urls.push(entry);
        }

        debug!(
            "Profile '{}' will run {} URLs {} times",
            profile_name,
            urls.len(),
            execute_rounds
        );

        Ok(Self {
            name: profile_name.to_string(),
            urls,
            current_url: 0,
            current_round: 0,
            execute_rounds,
            cookies: CookieJar::new(),
            params,
            base_url,
            proxy,
        })
    }

    /// Build the request for the current entry, after its pre-delay.
    ///
    /// A URL that does not parse is a [`FloodError::MalformedUrl`], which is
    /// fatal to the process.
    pub fn get_next_url(&mut self) -> Result<Request> {
        let entry = &self.urls[self.current_url];

        let template = entry.request_template.as_deref().unwrap_or(&entry.url);
        let expanded = self.params.expand(template, ExpandMode::ExpandSet);
        let uri = match &self.base_url {
            Some(base) if expanded.starts_with('/') => format!("{}{}", base, expanded),
            _ => expanded,
        };

        let payload = match &entry.payload {
            Some(Payload::Literal(text)) => Some(text.clone().into_bytes()),
            Some(Payload::Template(template)) => Some(
                self.params
                    .expand(template, ExpandMode::ExpandSet)
                    .into_bytes(),
            ),
            Some(Payload::File(bytes)) => Some(bytes.clone()),
            None => None,
        };

        entry.predelay.apply(self.params.rng());

        let mut request = Request::new(uri, entry.method.clone())?
            .with_proxy(self.proxy.clone())
            .with_full_response(entry.wants_full_response());
        if let Some(payload) = payload {
            request = request.with_payload(payload, entry.content_type.clone());
        }

        trace!("Generating request to: {}", request.uri());
        Ok(request)
    }

    /// Serialize `request` with authentication, cookies and extra headers.
    pub fn create_req(&self, request: &mut Request) -> Result<()> {
        let entry = &self.urls[self.current_url];

        let mut headers = Vec::with_capacity(entry.extra_headers.len() + 2);
        headers.extend(entry.authorization());
        headers.extend(self.cookies.header());
        headers.extend(entry.extra_headers.iter().cloned());

        request.serialize(&headers);
        Ok(())
    }

    /// Capture cookies and the configured response value.
    pub fn postprocess(&mut self, response: &Response) -> Result<()> {
        let text = response.text();
        if let Some(cookie) = self.cookies.capture(&text) {
            debug!("Captured cookie {}={}", cookie.name, cookie.value);
        }

        let entry = &self.urls[self.current_url];
        let captured = if let Some(template) = &entry.response_template {
            let pattern = self.params.expand(template, ExpandMode::Expand);
            let re = Regex::new(&pattern).map_err(|source| FloodError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            let value = re
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or(FloodError::CaptureNoMatch { pattern })?;
            Some(value)
        } else if let Some(script) = &entry.response_script {
            Some(run_capture_script(script, response.body())?)
        } else {
            None
        };

        if let (Some(value), Some(name)) = (captured, &entry.response_name) {
            debug!("Captured {}={}", name, value);
            self.params.set(name.as_str(), value);
        }
        Ok(())
    }

    /// Advance to the next entry; `false` once the last round is complete.
    ///
    /// The post-delay of the entry just run is applied only when another
    /// request follows.
    pub fn loop_condition(&mut self) -> bool {
        let completed = self.current_url;

        self.current_url += 1;
        if self.current_url >= self.urls.len() {
            self.current_url = 0;
            self.current_round += 1;
        }

        let continuing = self.current_round < self.execute_rounds;
        trace!(
            "Profile '{}' round {} of {}, {}",
            self.name,
            self.current_round,
            self.execute_rounds,
            if continuing { "continuing" } else { "finished" }
        );

        if continuing {
            self.urls[completed].postdelay.apply(self.params.rng());
        }
        continuing
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn urls(&self) -> &[UrlEntry] {
        &self.urls
    }

    pub fn current_url(&self) -> usize {
        self.current_url
    }

    pub fn current_round(&self) -> u64 {
        self.current_round
    }

    pub fn execute_rounds(&self) -> u64 {
        self.execute_rounds
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputSink;
    use http::Method;

    fn ctx() -> RuntimeContext {
        RuntimeContext::new(OutputSink::memory().0)
            .unwrap()
            .with_seed(Some(11))
    }

    fn profile(xml: &str) -> Result<RoundRobinProfile> {
        let config = ConfigTree::parse(xml).unwrap();
        RoundRobinProfile::init(&ctx(), &config, "RR")
    }

    const TWO_URLS: &str = r#"
        <flood configversion="1">
          <urllist>
            <name>List</name>
            <url>http://localhost/a</url>
            <url method="POST" payload="x=1">http://localhost/b?q=2</url>
          </urllist>
          <profile><name>RR</name><useurllist>List</useurllist><count>2</count></profile>
        </flood>"#;

    #[test]
    fn test_cursor_wraps_and_stops() {
        let mut rr = profile(TWO_URLS).unwrap();
        assert_eq!(rr.urls().len(), 2);
        assert_eq!(rr.execute_rounds(), 2);

        // urls * rounds iterations; only the last one stops
        let results: Vec<bool> = (0..4).map(|_| rr.loop_condition()).collect();
        assert_eq!(results, vec![true, true, true, false]);
        assert_eq!(rr.current_url(), 0);
        assert_eq!(rr.current_round(), 2);
    }

    #[test]
    fn test_requests_follow_the_list() {
        let mut rr = profile(TWO_URLS).unwrap();

        let mut first = rr.get_next_url().unwrap();
        assert_eq!(first.method(), &Method::GET);
        rr.create_req(&mut first).unwrap();
        assert!(first.wire().starts_with(b"GET /a HTTP/1.1\r\n"));
        rr.loop_condition();

        let mut second = rr.get_next_url().unwrap();
        assert_eq!(second.payload(), Some(&b"x=1"[..]));
        rr.create_req(&mut second).unwrap();
        let wire = String::from_utf8(second.wire().to_vec()).unwrap();
        assert!(wire.starts_with("POST /b?q=2 HTTP/1.1\r\n"));
        assert!(wire.ends_with("\r\n\r\nx=1"));
    }

    #[test]
    fn test_count_defaults_to_one() {
        let rr = profile(
            r#"<flood><urllist><name>L</name><url>http://h/</url></urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();
        assert_eq!(rr.execute_rounds(), 1);
    }

    #[test]
    fn test_missing_urllist_reference() {
        let err = profile(r#"<flood><profile><name>RR</name></profile></flood>"#).unwrap_err();
        assert!(matches!(err, FloodError::MissingNode { .. }));

        let err = profile(
            r#"<flood><profile><name>RR</name><useurllist>Nope</useurllist></profile></flood>"#,
        )
        .unwrap_err();
        assert!(matches!(err, FloodError::MissingNode { .. }));
    }

    #[test]
    fn test_empty_urllist() {
        let err = profile(
            r#"<flood><urllist><name>L</name></urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap_err();
        assert!(matches!(err, FloodError::Config(_)));
    }

    #[test]
    fn test_sequences_base_url_and_templates() {
        let mut rr = profile(
            r#"<flood><urllist><name>L</name>
                 <baseurl>http://example.com/</baseurl>
                 <sequence sequencename="page" sequencelist="a,b">
                   <url>/${page}.html</url>
                 </sequence>
                 <url requesttemplate="http://example.com/s?id=${=sid}">ignored</url>
               </urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();
        assert_eq!(rr.urls().len(), 3);

        assert_eq!(rr.get_next_url().unwrap().uri(), "http://example.com/a.html");
        rr.loop_condition();
        assert_eq!(rr.get_next_url().unwrap().uri(), "http://example.com/b.html");
        rr.loop_condition();

        let generated = rr.get_next_url().unwrap();
        let sid = rr.params().get("sid").unwrap();
        assert_eq!(generated.uri(), format!("http://example.com/s?id={}", sid));
    }

    #[test]
    fn test_malformed_url_is_fatal() {
        let mut rr = profile(
            r#"<flood><urllist><name>L</name><url>/no/base</url></urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();
        assert!(rr.get_next_url().unwrap_err().is_fatal());
    }

    #[test]
    fn test_postprocess_cookies_and_capture() {
        let mut rr = profile(
            r#"<flood><urllist><name>L</name>
                 <url responsetemplate="token=([0-9a-f]+)" responsename="token">http://h/login</url>
                 <url requesttemplate="http://h/use?t=${token}">x</url>
               </urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();

        let request = rr.get_next_url().unwrap();
        assert!(request.want_full_response());

        let response = Response::parse(
            b"HTTP/1.1 200 OK\r\nSet-Cookie: sid=abc123; Path=/\r\nContent-Length: 12\r\n\r\ntoken=beef42",
            &Method::GET,
        );
        rr.postprocess(&response).unwrap();
        assert_eq!(rr.params().get("token"), Some("beef42"));
        assert_eq!(rr.cookies().len(), 1);
        rr.loop_condition();

        let mut next = rr.get_next_url().unwrap();
        assert_eq!(next.uri(), "http://h/use?t=beef42");
        rr.create_req(&mut next).unwrap();
        let wire = String::from_utf8(next.wire().to_vec()).unwrap();
        assert!(wire.contains("Cookie: sid=abc123\r\n"));
    }

    #[test]
    fn test_capture_without_match_fails() {
        let mut rr = profile(
            r#"<flood><urllist><name>L</name>
                 <url responsetemplate="token=([0-9]+)" responsename="token">http://h/</url>
               </urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();
        let response = Response::parse(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", &Method::GET);
        assert!(matches!(
            rr.postprocess(&response),
            Err(FloodError::CaptureNoMatch { .. })
        ));
    }

    #[test]
    fn test_proxy_is_attached() {
        let mut rr = profile(
            r#"<flood><urllist><name>L</name><proxyurl>http://proxy:3128</proxyurl>
                 <url>http://origin/x</url></urllist>
               <profile><name>RR</name><useurllist>L</useurllist></profile></flood>"#,
        )
        .unwrap();
        let mut request = rr.get_next_url().unwrap();
        assert_eq!(request.proxy().unwrap().port(), 3128);
        rr.create_req(&mut request).unwrap();
        assert!(request.wire().starts_with(b"GET http://origin/x HTTP/1.1\r\n"));
    }
}
