//! In-page scripts evaluated by [`crate::ChromiumPage`].
//!
//! Every script is a function expression taking a single JSON argument.

/// Attribute stamped on queried elements so later clicks can find them again.
pub const HANDLE_ATTR: &str = "data-renew-pilot-id";

/// Resolve a serialized [`crate::Selector`] into element snapshots.
///
/// Text selectors keep only the deepest matching elements and lift each one to
/// its closest clickable ancestor, mirroring how a user would click the label
/// of a button.
pub const QUERY_ELEMENTS: &str = r#"(spec) => {
  const ATTR = 'data-renew-pilot-id';
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const CLICKABLE = 'button, a, [role="button"], [role="link"], [role="menuitem"], input[type="submit"], input[type="button"], summary, [onclick]';
  let nodes = [];
  if (spec.kind === 'css') {
    nodes = Array.from(document.querySelectorAll(spec.css));
  } else if (spec.kind === 'text_pattern' || spec.kind === 'text_exact') {
    let test;
    if (spec.kind === 'text_pattern') {
      const re = new RegExp(spec.pattern, spec.case_insensitive ? 'i' : '');
      test = (t) => re.test(t);
    } else {
      const want = norm(spec.text).toLowerCase();
      test = (t) => t.toLowerCase() === want;
    }
    const all = Array.from(document.body ? document.body.querySelectorAll('*') : []);
    const hits = all.filter((el) => !['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(el.tagName)
      && test(norm(el.innerText || el.value || '')));
    const deepest = hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
    const seen = new Set();
    for (const el of deepest) {
      const target = el.closest(CLICKABLE) || el;
      if (!seen.has(target)) {
        seen.add(target);
        nodes.push(target);
      }
    }
  } else if (spec.kind === 'attribute_contains') {
    const prefix = spec.prefix.toLowerCase();
    const needle = spec.needle.toLowerCase();
    nodes = Array.from(document.querySelectorAll('*')).filter((el) =>
      Array.from(el.attributes).some((a) => {
        const name = a.name.toLowerCase();
        return name !== ATTR && name.startsWith(prefix)
          && (name.includes(needle) || (a.value || '').toLowerCase().includes(needle));
      }));
  }
  window.__renewPilotSeq = window.__renewPilotSeq || 0;
  return nodes.map((el) => {
    if (!el.hasAttribute(ATTR)) {
      window.__renewPilotSeq += 1;
      el.setAttribute(ATTR, 'rp-' + window.__renewPilotSeq);
    }
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const attributes = {};
    for (const a of Array.from(el.attributes)) {
      if (a.name !== ATTR) attributes[a.name] = a.value;
    }
    return {
      handle: el.getAttribute(ATTR),
      tag: el.tagName.toLowerCase(),
      text: norm(el.innerText || el.value || '').slice(0, 2000),
      attributes,
      cells: Array.from(el.children).map((c) => norm(c.innerText || '')).filter((t) => t.length > 0),
      visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none',
      enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
    };
  });
}"#;

/// Click the element stamped with `arg.handle`; returns whether it was found.
pub const CLICK_BY_HANDLE: &str = r#"(arg) => {
  const el = document.querySelector('[data-renew-pilot-id="' + arg.handle + '"]');
  if (!el) return false;
  el.click();
  return true;
}"#;

pub const VISIBLE_TEXT: &str = r#"() => document.body ? document.body.innerText : ''"#;

/// Ready state plus the number of resource entries, used to detect network quiet.
pub const LOAD_PROBE: &str = r#"() => ({
  ready: document.readyState,
  resources: performance.getEntriesByType('resource').length,
})"#;
