//! Rewrites proxied HTML so pages keep working when viewed through `/fetch`.
//!
//! Four passes, in order: a `<base>` tag after the first `<head>`, asset
//! references under the known static prefixes routed back through the
//! gateway, `None` turned into `null` inside inline scripts, and a Swagger UI
//! override script before `</body>`.

use crate::error::GatewayError;
use regex::{Captures, Regex};
use url::Url;

/// Spec URL the injected Swagger override loads (through the gateway)
pub const SWAGGER_SPEC_URL: &str = "http://localhost:9000/openapi/openapi.json";

const HEAD_PATTERN: &str = r"(?i)<head\b[^>]*>";
const ASSET_PATTERN: &str =
    r#"(?P<prefix>\b(?:src|href)\s*=\s*["'])(?P<url>(?:\./|/)?(?:swagger|flasgger_static|static)[^"']*)"#;
const SCRIPT_PATTERN: &str = r"(?is)<script\b[^>]*>.*?</script>";
const NONE_PATTERN: &str = r"\bNone\b";
const BODY_CLOSE_PATTERN: &str = r"(?i)</body>";

/// `/fetch?url=<percent-encoded target>`
pub fn gateway_link(target: &str) -> String {
    format!("/fetch?url={}", urlencoding::encode(target))
}

#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    head: Regex,
    asset: Regex,
    script: Regex,
    none_token: Regex,
    body_close: Regex,
    override_script: String,
}

impl HtmlRewriter {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_spec_url(SWAGGER_SPEC_URL)
    }

    pub fn with_spec_url(spec_url: &str) -> Result<Self, GatewayError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| GatewayError::Configuration(format!("rewrite pattern: {}", e)))
        };

        Ok(Self {
            head: compile(HEAD_PATTERN)?,
            asset: compile(ASSET_PATTERN)?,
            script: compile(SCRIPT_PATTERN)?,
            none_token: compile(NONE_PATTERN)?,
            body_close: compile(BODY_CLOSE_PATTERN)?,
            override_script: swagger_override(&gateway_link(spec_url)),
        })
    }

    /// Apply every pass to a page fetched from `target`
    pub fn rewrite(&self, html: &str, target: &Url) -> String {
        let text = self.inject_base(html, target);
        let text = self.route_assets(&text, target);
        let text = self.null_in_scripts(&text);
        self.inject_override(&text)
    }

    pub fn inject_base(&self, html: &str, target: &Url) -> String {
        let base = format!(r#"<base href="{}" />"#, gateway_link(target.as_str()));
        self.head
            .replacen(html, 1, |caps: &Captures| format!("{}{}", &caps[0], base))
            .into_owned()
    }

    pub fn route_assets(&self, html: &str, target: &Url) -> String {
        self.asset
            .replace_all(html, |caps: &Captures| {
                let reference = &caps["url"];
                match target.join(reference) {
                    Ok(absolute) => format!("{}{}", &caps["prefix"], gateway_link(absolute.as_str())),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    pub fn null_in_scripts(&self, html: &str) -> String {
        self.script
            .replace_all(html, |caps: &Captures| {
                self.none_token.replace_all(&caps[0], "null").into_owned()
            })
            .into_owned()
    }

    pub fn inject_override(&self, html: &str) -> String {
        self.body_close
            .replacen(html, 1, |caps: &Captures| {
                format!("{}{}", self.override_script, &caps[0])
            })
            .into_owned()
    }
}

fn swagger_override(spec_link: &str) -> String {
    format!(
        r#"
<script>
(function() {{
    const FIXED_SPEC_URL = "{spec_link}";
    function updateSwaggerSpec() {{
        if (window.ui && ui.specActions) {{
            ui.specActions.updateUrl(FIXED_SPEC_URL);
            ui.specActions.download(FIXED_SPEC_URL);
        }}
        const input = document.querySelector(".download-url-input");
        if (input) input.value = FIXED_SPEC_URL;
    }}
    document.addEventListener("DOMContentLoaded", updateSwaggerSpec);
    window.addEventListener("load", updateSwaggerSpec);
    setTimeout(updateSwaggerSpec, 100);
}})();
</script>
"#
    )
}
