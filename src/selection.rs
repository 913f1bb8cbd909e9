use crate::catalog::AssetId;
use std::collections::HashSet;

/// Pointer modifiers as the click handler sees them. `toggle` covers
/// ctrl/cmd, `range` covers shift.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickModifiers {
    pub toggle: bool,
    pub range: bool,
}

/// What the shell should do with the detail panel after a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailAction {
    None,
    Open(AssetId),
    Close,
}

/// Multi-selection state machine over the filtered list order. Membership is
/// tracked by asset identity only; ids that later fall out of view stay
/// selected until explicitly cleared.
#[derive(Debug, Default)]
pub struct SelectionState {
    selected: HashSet<AssetId>,
    last_clicked: Option<usize>,
    detail: Option<AssetId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &HashSet<AssetId> {
        &self.selected
    }

    pub fn is_selected(&self, id: AssetId) -> bool {
        self.selected.contains(&id)
    }

    pub fn detail(&self) -> Option<AssetId> {
        self.detail
    }

    /// Bulk-action affordances show exactly while the selection is non-empty.
    pub fn bulk_actions_visible(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Interprets one pointer click against the current filtered-list order.
    pub fn handle_click(
        &mut self,
        asset: AssetId,
        index: usize,
        mods: ClickModifiers,
        order: &[AssetId],
    ) -> DetailAction {
        if mods.toggle {
            self.toggle(asset);
            self.last_clicked = Some(index);
            return DetailAction::None;
        }

        if mods.range {
            if let Some(anchor) = self.last_clicked {
                let (start, end) = if anchor <= index { (anchor, index) } else { (index, anchor) };
                for id in order.iter().skip(start).take(end - start + 1) {
                    self.selected.insert(*id);
                }
                return DetailAction::None;
            }
            // No anchor yet: fall through to plain-click semantics.
        }

        if !self.selected.is_empty() {
            // Selection mode absorbs plain clicks instead of collapsing to a
            // single-select, and the clicked asset also gets the panel.
            self.toggle(asset);
            self.last_clicked = Some(index);
            self.detail = Some(asset);
            return DetailAction::Open(asset);
        }

        self.last_clicked = Some(index);
        if self.detail == Some(asset) {
            self.detail = None;
            DetailAction::Close
        } else {
            self.detail = Some(asset);
            DetailAction::Open(asset)
        }
    }

    pub fn toggle(&mut self, id: AssetId) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    pub fn select_all_visible(&mut self, order: &[AssetId]) {
        self.selected.extend(order.iter().copied());
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn open_detail(&mut self, id: AssetId) {
        self.detail = Some(id);
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }
}
