//! Append-only chat log

use crate::state::ChatEntry;

/// Ordered log of chat entries.
///
/// Entries are only ever appended; there is no way to remove, reorder or
/// edit one once it is in the log. Renderers iterate the full sequence.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    entries: Vec<ChatEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a ChatEntry;
    type IntoIter = std::slice::Iter<'a, ChatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Sender;

    #[test]
    fn test_append_preserves_order() {
        let mut conversation = Conversation::new();
        conversation.append(ChatEntry::user("first"));
        conversation.append(ChatEntry::system("second"));
        conversation.append(ChatEntry::user("third"));

        let texts: Vec<&str> = conversation.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(conversation.last().map(|e| e.sender), Some(Sender::User));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut conversation = Conversation::new();
        conversation.append(ChatEntry::user("again"));
        conversation.append(ChatEntry::user("again"));

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.entries()[0], conversation.entries()[1]);
    }
}
