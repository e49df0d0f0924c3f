use tracing::warn;

use crate::card::Card;
use crate::errors::StoreResult;
use crate::store::MemberDirectory;
use crate::types::MemberRole;

/// resolves the e-mail addresses a card's notifications go to
pub struct RecipientResolver<'a> {
    directory: &'a dyn MemberDirectory,
}

impl<'a> RecipientResolver<'a> {
    pub fn new(directory: &'a dyn MemberDirectory) -> Self {
        Self { directory }
    }

    /// card owner first, then every owner of the family, without duplicates.
    /// A failed owner lookup is skipped; a failed family lookup is returned.
    pub fn resolve(&self, card: &Card) -> StoreResult<Vec<String>> {
        let mut emails: Vec<String> = Vec::new();

        if let Some(owner_id) = card.owner_member_id {
            match self.directory.member(owner_id) {
                Ok(Some(member)) => push_unique(&mut emails, member.email),
                Ok(None) => {}
                Err(err) => warn!(
                    card_id = %card.id,
                    member_id = %owner_id,
                    error = %err,
                    "card owner lookup failed, continuing with family owners"
                ),
            }
        }

        for member in self.directory.family_members(card.family_id)? {
            if member.role == MemberRole::Owner {
                push_unique(&mut emails, member.email);
            }
        }

        Ok(emails)
    }
}

fn push_unique(emails: &mut Vec<String>, email: Option<String>) {
    if let Some(email) = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        if !emails.contains(&email) {
            emails.push(email);
        }
    }
}
