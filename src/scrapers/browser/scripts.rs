//! JavaScript evaluated inside rendered pages.

/// Resolves once the document is interactive.
pub const WAIT_READY: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Three short scrolls to trigger lazy loading.
pub const LIGHT_SCROLL: &str = r#"
    (async () => {
        for (let i = 0; i < 3; i++) {
            window.scrollBy(0, document.body.scrollHeight / 3);
            await new Promise(r => setTimeout(r, 300));
        }
        return true;
    })()
"#;

/// Scroll to the bottom until the page height stops growing.
pub fn scroll_to_bottom(max_scrolls: usize) -> String {
    format!(
        r#"
    (async () => {{
        let last = 0;
        for (let i = 0; i < {max}; i++) {{
            window.scrollTo(0, document.body.scrollHeight);
            await new Promise(r => setTimeout(r, 400));
            const height = document.body.scrollHeight;
            if (height === last) break;
            last = height;
        }}
        return last;
    }})()
"#,
        max = max_scrolls
    )
}

/// Click tab-like controls and elements whose text mentions any keyword.
///
/// Returns the number of elements clicked.
pub fn click_tabs(keywords: &[String]) -> String {
    let keywords = serde_json::to_string(keywords).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"
    (async () => {{
        const keywords = {keywords};
        const fold = (s) => (s || '').normalize('NFD').replace(/[\u0300-\u036f]/g, '').toLowerCase();
        const matches = (el) => {{
            const text = fold(el.innerText);
            return keywords.some(k => text.includes(fold(k)));
        }};
        const isTab = (el) => {{
            const href = el.getAttribute('href') || '';
            const cls = (el.className && el.className.toString()) || '';
            return href.startsWith('#') || href.startsWith('javascript') || href === ''
                || el.getAttribute('role') === 'tab'
                || /\btab\b/i.test(cls)
                || el.hasAttribute('data-toggle') || el.hasAttribute('data-bs-toggle');
        }};
        let clicked = 0;
        for (const el of document.querySelectorAll('a, button, li, span, div[role="tab"]')) {{
            const anchor = el.tagName === 'A';
            if ((anchor && isTab(el) && (matches(el) || el.getAttribute('role') === 'tab'))
                || (!anchor && el.children.length === 0 && matches(el))) {{
                try {{
                    el.click();
                    clicked++;
                    await new Promise(r => setTimeout(r, 300));
                }} catch (e) {{}}
            }}
        }}
        return clicked;
    }})()
"#,
        keywords = keywords
    )
}

/// Year-like options of every `select`, as `[select index, option value]` pairs.
pub const LIST_YEAR_OPTIONS: &str = r#"
    (() => {
        const out = [];
        document.querySelectorAll('select').forEach((sel, i) => {
            for (const op of sel.options) {
                if (/^\s*\d{4}\s*$/.test(op.text)) out.push([i, op.value]);
            }
        });
        return out;
    })()
"#;

/// Select one option and fire the change event.
pub fn select_option(select_index: usize, value: &str) -> String {
    let value = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
    (() => {{
        const sel = document.querySelectorAll('select')[{index}];
        if (!sel) return false;
        sel.value = {value};
        sel.dispatchEvent(new Event('input', {{ bubbles: true }}));
        sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
        return true;
    }})()
"#,
        index = select_index,
        value = value
    )
}

/// Click a "next page" control if one exists.
pub const CLICK_NEXT: &str = r#"
    (() => {
        const candidates = Array.from(document.querySelectorAll('a, button'));
        const next = candidates.find(el => {
            const text = (el.innerText || '').trim();
            const cls = (el.className && el.className.toString()) || '';
            return /pr[oó]xim[oa]/i.test(text) || text === '>' || text === '»'
                || /\bnext\b/i.test(cls) || el.getAttribute('rel') === 'next';
        });
        if (!next || next.disabled || next.classList.contains('disabled')) return false;
        next.click();
        return true;
    })()
"#;

/// Tag every `a`/`button` with an index and list them.
pub const TAG_CLICKABLES: &str = r#"
    (() => {
        const out = [];
        document.querySelectorAll('a, button').forEach((el, i) => {
            el.setAttribute('data-ata-idx', String(i));
            out.push({ index: i, text: (el.innerText || '').trim(), href: el.href || '' });
        });
        return out;
    })()
"#;

/// Click the element tagged with `index`.
pub fn click_tagged(index: usize) -> String {
    format!(
        r#"
    (() => {{
        const el = document.querySelector('[data-ata-idx="{index}"]');
        if (!el) return false;
        el.scrollIntoView(true);
        el.click();
        return true;
    }})()
"#,
        index = index
    )
}
