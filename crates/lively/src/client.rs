// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The browser side of live reload.
//!
//! [`reload_script`] renders a small script that long-polls
//! [`RELOAD_ENDPOINT`] with its cursor, a per-tab client id and the page
//! path. `patch:` tokens re-fetch matching stylesheets and scripts in place;
//! any other token reloads the page. [`inject_script`] places it into HTML.

use crate::queue::Cursor;

/// Path of the long-poll endpoint.
pub const RELOAD_ENDPOINT: &str = "/__livereload";

/// Path of the WebSocket streaming endpoint.
pub const STREAM_ENDPOINT: &str = "/__livereload/ws";

const SCRIPT_TEMPLATE: &str = r#"
<script>
(function() {
    var endpoint = '__ENDPOINT__';
    var prefix = '__PREFIX__';
    var cursor = __CURSOR__;
    var client = Math.random().toString(36).slice(2) + Date.now().toString(36);

    function fresh(url) {
        var u = new URL(url, window.location.href);
        u.searchParams.set('__lively', Date.now());
        return u.href;
    }

    function sameAsset(url, asset) {
        try {
            return new URL(url, window.location.href).pathname === prefix + asset;
        } catch (e) {
            return false;
        }
    }

    function patch(asset) {
        document.querySelectorAll('link[rel="stylesheet"][href]').forEach(function(link) {
            if (!sameAsset(link.href, asset)) return;
            var next = link.cloneNode();
            next.href = fresh(link.href);
            next.onload = function() { link.remove(); };
            link.after(next);
        });
        document.querySelectorAll('script[src]').forEach(function(script) {
            if (!sameAsset(script.src, asset)) return;
            var next = document.createElement('script');
            for (var i = 0; i < script.attributes.length; i++) {
                next.setAttribute(script.attributes[i].name, script.attributes[i].value);
            }
            next.src = fresh(script.src);
            script.replaceWith(next);
        });
    }

    function poll() {
        var url = endpoint + '?cursor=' + cursor + '&client=' + client +
            '&path=' + encodeURIComponent(window.location.pathname);
        fetch(url, { cache: 'no-store' })
            .then(function(res) {
                if (!res.ok) throw new Error('status ' + res.status);
                return res.json();
            })
            .then(function(body) {
                cursor = body.cursor;
                var reload = false;
                body.patterns.forEach(function(p) {
                    if (p.indexOf('patch:') === 0) {
                        console.log('[lively] Patching ' + p.slice(6));
                        patch(p.slice(6));
                    } else {
                        reload = true;
                    }
                });
                if (reload) {
                    console.log('[lively] Reloading...');
                    window.location.reload();
                    return;
                }
                poll();
            })
            .catch(function(err) {
                console.log('[lively] Connection lost, retrying...', err);
                setTimeout(poll, 3000);
            });
    }

    poll();
})();
</script>
"#;

/// Renders the client script for a page served at queue position `cursor`.
///
/// `prefix` is the URL prefix assets are served under (empty for none).
pub fn reload_script(cursor: Cursor, prefix: &str) -> String {
    SCRIPT_TEMPLATE
        .replace("__ENDPOINT__", &js_string(&format!("{}{}", prefix, RELOAD_ENDPOINT)))
        .replace("__PREFIX__", &js_string(prefix))
        .replace("__CURSOR__", &cursor.to_string())
}

/// Inserts `script` before `</body>`, else before `</html>`, else at the end.
pub fn inject_script(html: &str, script: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let lower = html.to_ascii_lowercase();
    let position = lower.rfind("</body>").or_else(|| lower.rfind("</html>"));

    match position {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + script.len());
            result.push_str(&html[..pos]);
            result.push_str(script);
            result.push_str(&html[pos..]);
            result
        }
        None => format!("{}{}", html, script),
    }
}

/// Escapes text for a single-quoted JS string inside an HTML script block.
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '<' => out.push_str("\\x3c"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_body() {
        let html = "<html><body><p>hi</p></body></html>";
        let out = inject_script(html, "<script></script>");
        assert_eq!(out, "<html><body><p>hi</p><script></script></body></html>");
    }

    #[test]
    fn test_inject_case_insensitive_and_fallbacks() {
        assert_eq!(inject_script("<HTML>x</HTML>", "S"), "<HTML>xS</HTML>");
        assert_eq!(inject_script("<p>fragment</p>", "S"), "<p>fragment</p>S");
        assert_eq!(inject_script("<p>é</p></BODY>", "S"), "<p>é</p>S</BODY>");
    }

    #[test]
    fn test_script_embeds_cursor_and_prefix() {
        let script = reload_script(Cursor::from(42), "/app");
        assert!(script.contains("var cursor = 42;"));
        assert!(script.contains("var prefix = '/app';"));
        assert!(script.contains("'/app/__livereload'"));
        assert!(!script.contains("__CURSOR__"));
    }

    #[test]
    fn test_prefix_is_escaped() {
        let script = reload_script(Cursor::START, "/it's</script>");
        assert!(script.contains(r"'/it\'s\x3c/script>'"));
    }
}
