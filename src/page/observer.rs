use std::cell::RefCell;
use std::rc::Rc;

use super::dom::{Document, NodeId};
use super::Page;

/// Which change classes an observer subscribes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    /// Everything, over the whole subtree.
    pub fn all() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
        old_value: Option<String>,
    },
    CharacterData {
        old_value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            MutationKind::ChildList { .. } => "childList",
            MutationKind::Attributes { .. } => "attributes",
            MutationKind::CharacterData { .. } => "characterData",
        }
    }
}

pub type MutationCallback = Rc<dyn Fn(&Page, &[MutationRecord])>;

/// A registered observer and its pending queue.
pub(crate) struct ObserverSlot {
    root: NodeId,
    init: MutationObserverInit,
    callback: MutationCallback,
    queue: RefCell<Vec<MutationRecord>>,
}

impl ObserverSlot {
    pub(crate) fn new(root: NodeId, init: MutationObserverInit, callback: MutationCallback) -> Self {
        Self {
            root,
            init,
            callback,
            queue: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn interested(&self, doc: &Document, record: &MutationRecord) -> bool {
        let wanted = match record.kind {
            MutationKind::ChildList { .. } => self.init.child_list,
            MutationKind::Attributes { .. } => self.init.attributes,
            MutationKind::CharacterData { .. } => self.init.character_data,
        };
        if !wanted {
            return false;
        }
        if self.init.subtree {
            doc.is_inclusive_ancestor(self.root, record.target)
        } else {
            record.target == self.root
        }
    }

    pub(crate) fn enqueue(&self, record: MutationRecord) {
        self.queue.borrow_mut().push(record);
    }

    pub(crate) fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    pub(crate) fn callback(&self) -> MutationCallback {
        Rc::clone(&self.callback)
    }
}
