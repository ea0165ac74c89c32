//! Capture of live frames into a [`Traceback`].
//!
//! The capture walks the real frame stack and nothing else. A frame released
//! by tail-call reuse has no entry here; the trace is the machine's truth,
//! not the logical call history.

use crate::frame::CallFrame;
use crate::realm::{DomainId, Realm};
use lumen_core::{TraceFrame, Traceback};

/// Capture all live frames, innermost first. Frames executing outside
/// `entry_domain` are annotated with their realm's name.
#[inline(never)]
pub fn capture(frames: &[CallFrame], entry_domain: DomainId, realms: &[Realm]) -> Traceback {
    let mut captured = Vec::with_capacity(frames.len());
    for frame in frames.iter().rev() {
        let realm = if frame.domain == entry_domain {
            None
        } else {
            realms
                .get(frame.domain.index())
                .map(|r| r.name().to_string())
        };
        captured.push(TraceFrame {
            function: frame.name().to_string(),
            span: frame.current_span,
            realm,
        });
    }
    Traceback { frames: captured }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::UnitId;
    use lumen_core::Span;

    fn frame_in(domain: DomainId, span: Span) -> CallFrame {
        let mut frame = CallFrame::script(domain, UnitId(0));
        frame.current_span = span;
        frame
    }

    #[test]
    fn test_innermost_first() {
        let frames = vec![
            frame_in(DomainId::MAIN, Span::new(0, 1)),
            frame_in(DomainId::MAIN, Span::new(10, 12)),
        ];
        let realms = vec![Realm::new(DomainId::MAIN, "main")];

        let tb = capture(&frames, DomainId::MAIN, &realms);
        assert_eq!(tb.len(), 2);
        assert_eq!(tb.frames[0].span, Span::new(10, 12));
        assert_eq!(tb.frames[1].span, Span::new(0, 1));
    }

    #[test]
    fn test_cross_realm_frames_are_annotated() {
        let frames = vec![
            frame_in(DomainId::MAIN, Span::new(0, 1)),
            frame_in(DomainId(1), Span::new(4, 6)),
        ];
        let realms = vec![
            Realm::new(DomainId::MAIN, "main"),
            Realm::new(DomainId(1), "plugin"),
        ];

        let tb = capture(&frames, DomainId::MAIN, &realms);
        assert_eq!(tb.frames[0].realm.as_deref(), Some("plugin"));
        assert_eq!(tb.frames[1].realm, None);
    }

    #[test]
    fn test_empty_stack_captures_nothing() {
        let tb = capture(&[], DomainId::MAIN, &[]);
        assert!(tb.is_empty());
    }
}
