/// Estimate picker attached to the card-detail title editor.
use crate::codec;
use crate::config::Settings;
use crate::dom::Document;
use crate::types::PointKind;

/// Attach one picker per point kind to the open editor, once each.
/// Returns how many pickers were attached.
pub fn ensure_pickers(doc: &mut dyn Document, settings: &Settings) -> usize {
    let Some(editor) = doc.card_editor() else {
        return 0;
    };
    let values = settings.estimate_values();
    let mut attached = 0;
    for kind in PointKind::ALL {
        if !doc.has_picker(editor, kind) {
            doc.attach_picker(editor, kind, &values);
            attached += 1;
        }
    }
    if attached > 0 {
        log::debug!(
            "[storypoints.picker] Attached {} picker(s) to {} with {} value(s)",
            attached,
            editor,
            values.len()
        );
    }
    attached
}

/// Write `value` into the open editor as a `kind` marker and save.
///
/// Returns the submitted title, or `None` when no editor is open or the value
/// is not a valid marker token.
pub fn pick(doc: &mut dyn Document, kind: PointKind, value: &str) -> Option<String> {
    if !codec::is_valid_token(value) {
        log::warn!("[storypoints.picker] Ignoring invalid value {:?}", value);
        return None;
    }
    let editor = doc.card_editor()?;
    let text = doc.editor_text(editor).unwrap_or_default();
    let updated = codec::encode(&text, kind.marker(), value);
    doc.submit_editor(editor, &updated);
    log::debug!("[storypoints.picker] {:?} set to {} -> {:?}", kind, value, updated);
    Some(updated)
}
