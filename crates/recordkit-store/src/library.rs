//! Library lending: books and members kept in two stores, changed together.

use crate::error::StoreError;
use crate::lending::{LendAction, LendState};
use crate::record::{Keyed, Record};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};

/// A lendable book keyed by ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default)]
    lending: LendState,
    #[serde(default = "default_available")]
    available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            lending: LendState::Available,
            available: true,
        }
    }

    pub fn lending(&self) -> &LendState {
        &self.lending
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

impl Record for Book {
    type Patch = BookPatch;

    fn derive(&mut self) {
        self.available = self.lending.is_available();
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::invalid_field("title", "must not be empty"));
        }
        if let Some(holder) = self.lending.holder()
            && holder.trim().is_empty()
        {
            return Err(StoreError::invalid_field("holder", "must not be empty"));
        }
        Ok(())
    }

    fn apply(&mut self, patch: BookPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn category(&self) -> Option<String> {
        Some(if self.available { "available" } else { "borrowed" }.to_string())
    }
}

/// A library member keyed by user ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    /// ISBNs currently held, in borrow order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    borrowed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberPatch {
    pub name: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            borrowed: Vec::new(),
        }
    }

    pub fn borrowed(&self) -> &[String] {
        &self.borrowed
    }
}

impl Record for Member {
    type Patch = MemberPatch;

    fn derive(&mut self) {}

    fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::invalid_field("name", "must not be empty"));
        }
        for (idx, isbn) in self.borrowed.iter().enumerate() {
            if self.borrowed[..idx].contains(isbn) {
                return Err(StoreError::invalid_field(
                    "borrowed",
                    format!("{isbn} listed twice"),
                ));
            }
        }
        Ok(())
    }

    fn apply(&mut self, patch: MemberPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self) -> Option<f64> {
        Some(self.borrowed.len() as f64)
    }
}

/// Books and members with the two-record borrow/return transition.
#[derive(Debug, Clone, Default)]
pub struct Library {
    books: RecordStore<String, Book>,
    members: RecordStore<String, Member>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a library from separately loaded stores.
    ///
    /// Every borrowed book must name an existing member who lists it, and
    /// every listed holding must point at a book borrowed by that member.
    pub fn from_stores(
        books: RecordStore<String, Book>,
        members: RecordStore<String, Member>,
    ) -> Result<Self, StoreError> {
        for row in books.iter() {
            if let Some(holder) = row.record.lending.holder() {
                let member = members.read(holder).map_err(|_| {
                    StoreError::invalid_field(
                        "holder",
                        format!("book {} is held by unknown member {holder}", row.key),
                    )
                })?;
                if !member.record.borrowed.contains(&row.key) {
                    return Err(StoreError::invalid_field(
                        "borrowed",
                        format!("member {holder} does not list book {}", row.key),
                    ));
                }
            }
        }
        for row in members.iter() {
            for isbn in &row.record.borrowed {
                let held_here = books
                    .read(isbn.as_str())
                    .map(|book| book.record.lending.holder() == Some(row.key.as_str()))
                    .unwrap_or(false);
                if !held_here {
                    return Err(StoreError::invalid_field(
                        "borrowed",
                        format!("member {} lists book {isbn} it does not hold", row.key),
                    ));
                }
            }
        }
        Ok(Self { books, members })
    }

    pub fn books(&self) -> &RecordStore<String, Book> {
        &self.books
    }

    pub fn members(&self) -> &RecordStore<String, Member> {
        &self.members
    }

    pub fn into_stores(self) -> (RecordStore<String, Book>, RecordStore<String, Member>) {
        (self.books, self.members)
    }

    /// Add a book; new books always start available.
    pub fn add_book(&mut self, isbn: impl Into<String>, book: Book) -> Result<String, StoreError> {
        if !book.lending.is_available() {
            return Err(StoreError::invalid_field(
                "lending",
                "new books must start available",
            ));
        }
        self.books.create_with_key(isbn.into(), book)
    }

    /// Remove a book that is not currently lent out.
    pub fn remove_book(&mut self, isbn: &str) -> Result<Keyed<String, Book>, StoreError> {
        let book = self.books.read(isbn)?;
        if !book.record.lending.is_available() {
            return Err(StoreError::InvalidStateTransition {
                key: isbn.to_string(),
                from: book.record.lending.to_string(),
                action: "remove".to_string(),
            });
        }
        self.books.delete(isbn)
    }

    pub fn update_book(
        &mut self,
        isbn: &str,
        patch: BookPatch,
    ) -> Result<&Keyed<String, Book>, StoreError> {
        self.books.update(isbn, patch)
    }

    /// Register a member with no holdings.
    pub fn add_member(
        &mut self,
        user_id: impl Into<String>,
        member: Member,
    ) -> Result<String, StoreError> {
        if !member.borrowed.is_empty() {
            return Err(StoreError::invalid_field(
                "borrowed",
                "new members must not hold books",
            ));
        }
        self.members.create_with_key(user_id.into(), member)
    }

    /// Remove a member who holds nothing.
    pub fn remove_member(&mut self, user_id: &str) -> Result<Keyed<String, Member>, StoreError> {
        let member = self.members.read(user_id)?;
        if !member.record.borrowed.is_empty() {
            return Err(StoreError::InvalidStateTransition {
                key: user_id.to_string(),
                from: format!("holding {} book(s)", member.record.borrowed.len()),
                action: "remove".to_string(),
            });
        }
        self.members.delete(user_id)
    }

    pub fn borrow(&mut self, user_id: &str, isbn: &str) -> Result<LendState, StoreError> {
        self.transfer(isbn, LendAction::borrow(user_id))
    }

    pub fn return_book(&mut self, user_id: &str, isbn: &str) -> Result<LendState, StoreError> {
        self.transfer(isbn, LendAction::give_back(user_id))
    }

    /// Move a book between lending states and update the holder's list.
    ///
    /// Both records are staged and validated before either is committed;
    /// any error leaves both unchanged.
    pub fn transfer(&mut self, isbn: &str, action: LendAction) -> Result<LendState, StoreError> {
        let holder = action.holder().to_string();
        let current = self.books.read(isbn)?.record.lending.clone();
        self.members.read(holder.as_str())?;
        let next = current.transition(isbn, &action)?;

        let (book, ()) = self.books.stage(isbn, |book| {
            book.lending = next.clone();
            Ok(())
        })?;
        let (member, ()) = self.members.stage(holder.as_str(), |member| {
            match action {
                LendAction::Borrow { .. } => member.borrowed.push(isbn.to_string()),
                LendAction::Return { .. } => member.borrowed.retain(|held| held != isbn),
            }
            Ok(())
        })?;

        self.books.commit(book)?;
        self.members.commit(member)?;
        Ok(next)
    }

    pub fn available_books(&self) -> Vec<&Keyed<String, Book>> {
        self.books.find(|row| row.record.is_available())
    }

    /// Books currently held by `user_id`, in borrow order.
    pub fn holdings(&self, user_id: &str) -> Result<Vec<&Keyed<String, Book>>, StoreError> {
        let member = self.members.read(user_id)?;
        member
            .record
            .borrowed
            .iter()
            .map(|isbn| self.books.read(isbn.as_str()))
            .collect()
    }

    /// The demonstration catalogue: four books and two members.
    pub fn sample() -> Result<Self, StoreError> {
        let mut library = Self::new();
        let books = [
            ("12345", "The Great Gatsby", "F. Scott Fitzgerald"),
            ("12346", "To Kill a Mockingbird", "Harper Lee"),
            ("12347", "1984", "George Orwell"),
            ("12348", "Pride and Prejudice", "Jane Austen"),
        ];
        for (isbn, title, author) in books {
            library.add_book(isbn, Book::new(title, author))?;
        }
        for (user_id, name) in [("U001", "Alice Johnson"), ("U002", "Bob Smith")] {
            library.add_member(user_id, Member::new(name))?;
        }
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalogue_starts_fully_available() {
        let library = Library::sample().expect("sample library");
        assert_eq!(library.books().len(), 4);
        assert_eq!(library.members().len(), 2);
        assert_eq!(library.available_books().len(), 4);
    }

    #[test]
    fn borrow_of_missing_book_touches_nothing() {
        let mut library = Library::sample().expect("sample library");
        let err = library
            .borrow("U001", "99999")
            .expect_err("missing book must error");
        assert!(matches!(err, StoreError::NotFound { key } if key == "99999"));
        assert!(library.holdings("U001").expect("member exists").is_empty());
    }

    #[test]
    fn borrow_by_unknown_member_touches_nothing() {
        let mut library = Library::sample().expect("sample library");
        let err = library
            .borrow("U404", "12345")
            .expect_err("unknown member must error");
        assert!(matches!(err, StoreError::NotFound { key } if key == "U404"));
        assert!(
            library
                .books()
                .read("12345")
                .expect("book exists")
                .record
                .is_available()
        );
    }

    #[test]
    fn removing_a_borrowed_book_is_rejected() {
        let mut library = Library::sample().expect("sample library");
        library.borrow("U001", "12345").expect("borrow");
        let err = library
            .remove_book("12345")
            .expect_err("borrowed book must not be removed");
        assert!(matches!(err, StoreError::InvalidStateTransition { .. }));
        assert_eq!(library.books().len(), 4);
        assert_eq!(
            library.members().read("U001").expect("member").record.borrowed(),
            ["12345".to_string()]
        );
    }

    #[test]
    fn removing_a_member_with_holdings_is_rejected() {
        let mut library = Library::sample().expect("sample library");
        library.borrow("U002", "12347").expect("borrow");
        let err = library
            .remove_member("U002")
            .expect_err("member with holdings must not be removed");
        assert!(matches!(err, StoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn from_stores_rejects_dangling_holder() {
        let mut library = Library::sample().expect("sample library");
        library.borrow("U001", "12345").expect("borrow");
        let (books, _) = library.into_stores();
        let err = Library::from_stores(books, RecordStore::new())
            .expect_err("holder must exist");
        assert!(matches!(err, StoreError::InvalidField { field: "holder", .. }));
    }

    #[test]
    fn from_stores_accepts_consistent_state() {
        let mut library = Library::sample().expect("sample library");
        library.borrow("U001", "12345").expect("borrow");
        library.borrow("U001", "12346").expect("borrow");
        let (books, members) = library.into_stores();
        let library = Library::from_stores(books, members).expect("state is consistent");
        let titles: Vec<&str> = library
            .holdings("U001")
            .expect("member exists")
            .iter()
            .map(|row| row.record.title.as_str())
            .collect();
        assert_eq!(titles, vec!["The Great Gatsby", "To Kill a Mockingbird"]);
    }
}
