//! In-page guard script.
//!
//! Runs in the browser, not in the proxy. It replaces `window.open` with a
//! no-op and wraps every `click` listener so that `window.open` stays
//! neutered for the duration of the handler and is restored afterwards.
//! Emitted verbatim; the marker attribute plus the exact body let the
//! injecting rule recognise a guard that is already present.

macro_rules! guard_body {
    () => {
        r#"
(function(){
  try {
    Object.defineProperty(window, 'open', { configurable:true, writable:true, value: function(){ return null; } });
  } catch(_) { window.open = function(){ return null; }; }

  const _add = EventTarget.prototype.addEventListener;
  EventTarget.prototype.addEventListener = function(type, handler, opts){
    if (type === 'click' && typeof handler === 'function') {
      const wrapped = function(ev){
        const _o = window.open;
        window.open = function(){ return null; };
        try { return handler.call(this, ev); }
        finally { window.open = _o; }
      };
      return _add.call(this, type, wrapped, opts);
    }
    return _add.call(this, type, handler, opts);
  };
})();
"#
    };
}

/// Attribute that marks the injected guard `<script>`.
pub const GUARD_MARKER: &str = "data-vidproxy-guard";

/// Script source, without the surrounding tags.
pub const GUARD_BODY: &str = guard_body!();

/// The complete guard element.
pub const GUARD_SCRIPT: &str = concat!("<script data-vidproxy-guard>", guard_body!(), "</script>");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_a_single_marked_script() {
        assert!(GUARD_SCRIPT.starts_with(&format!("<script {GUARD_MARKER}>")));
        assert!(GUARD_SCRIPT.ends_with("</script>"));
        assert_eq!(GUARD_SCRIPT.matches("</script>").count(), 1);
        assert!(GUARD_SCRIPT.contains(GUARD_BODY));
    }

    #[test]
    fn guard_neuters_window_open_and_wraps_click_listeners() {
        assert!(GUARD_BODY.contains("Object.defineProperty(window, 'open'"));
        assert!(GUARD_BODY.contains("catch(_) { window.open = function(){ return null; }; }"));
        assert!(GUARD_BODY.contains("type === 'click'"));
        assert!(GUARD_BODY.contains("finally { window.open = _o; }"));
    }
}
