//! Scripts injected into browser pages and browser-like request headers.

use std::time::Duration;

/// `Accept-Language` sent by both renderers.
pub(crate) const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

pub(crate) const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Chromium flags that hide the most obvious automation fingerprints.
pub(crate) const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
];

/// Evaluated before any page script on every new document.
pub(crate) const STEALTH_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
window.chrome = window.chrome || { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
Object.defineProperty(navigator, 'plugins', {
    get: () => [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
    ],
    configurable: true
});
";

/// Resolves once the DOM is parsed, or after `timeout` at the latest.
pub(crate) fn dom_ready_script(timeout: Duration) -> String {
    let timeout_ms = timeout.as_millis();
    format!(
        r"new Promise((resolve) => {{
            if (document.readyState === 'complete' || document.readyState === 'interactive') {{
                resolve(document.readyState);
            }} else {{
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), {timeout_ms});
            }}
        }})"
    )
}

/// Resolves to `true` once the document is complete and the resource count
/// has been stable for `quiet`, or to `false` when `timeout` elapses first.
pub(crate) fn network_idle_script(timeout: Duration, quiet: Duration) -> String {
    let timeout_ms = timeout.as_millis();
    let quiet_ms = quiet.as_millis();
    format!(
        r"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = {quiet_ms};
            const interval = 100;
            const start = Date.now();
            let lastCount = 0;
            let stableMs = 0;
            try {{ lastCount = performance.getEntriesByType('resource').length; }} catch (_) {{ lastCount = 0; }}
            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                let curCount = lastCount;
                try {{ curCount = performance.getEntriesByType('resource').length; }} catch (_) {{ curCount = lastCount; }}
                if (document.readyState === 'complete' && curCount === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) {{ return true; }}
                }} else {{
                    stableMs = 0;
                }}
                lastCount = curCount;
            }}
            return false;
        }})()"
    )
}

/// Polls `selector` until it matches, resolving to `true`, or to `false` once
/// `timeout` elapses.
pub(crate) fn selector_wait_script(selector: &str, timeout: Duration) -> String {
    let timeout_ms = timeout.as_millis();
    format!(
        r"(async () => {{
            const selector = {selector:?};
            const timeoutMs = {timeout_ms};
            const start = Date.now();
            while (true) {{
                try {{ if (document.querySelector(selector)) {{ return true; }} }} catch (_) {{ return false; }}
                if (Date.now() - start >= timeoutMs) {{ return false; }}
                await new Promise(r => setTimeout(r, 100));
            }}
        }})()"
    )
}
