use clap::{Parser, Subcommand, ValueEnum};
use recordkit_store::SortOrder;

#[derive(Parser)]
#[command(
    name = "recordkit",
    about = "recordkit: keyed record stores for students, accounts, library lending and notes",
    version
)]
pub struct Cli {
    /// Directory holding snapshots, the notes file and optional recordkit.toml
    #[arg(long, global = true, env = "RECORDKIT_DATA_DIR", default_value = ".recordkit")]
    pub data_dir: String,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage student records (marks with derived grades)
    Student {
        #[command(subcommand)]
        command: StudentCommands,
    },

    /// Manage bank accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Manage library books, members and lending
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },

    /// Manage the flat notes file
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StudentSortArg {
    #[value(name = "id")]
    Id,
    #[value(name = "name-asc")]
    NameAsc,
    #[value(name = "name-desc")]
    NameDesc,
    #[value(name = "marks-asc")]
    MarksAsc,
    #[value(name = "marks-desc")]
    MarksDesc,
}

impl From<StudentSortArg> for SortOrder {
    fn from(arg: StudentSortArg) -> Self {
        match arg {
            StudentSortArg::Id => SortOrder::KeyAsc,
            StudentSortArg::NameAsc => SortOrder::NameAsc,
            StudentSortArg::NameDesc => SortOrder::NameDesc,
            StudentSortArg::MarksAsc => SortOrder::MeasureAsc,
            StudentSortArg::MarksDesc => SortOrder::MeasureDesc,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AccountSortArg {
    #[value(name = "number")]
    Number,
    #[value(name = "holder")]
    Holder,
    #[value(name = "balance-asc")]
    BalanceAsc,
    #[value(name = "balance-desc")]
    BalanceDesc,
}

impl From<AccountSortArg> for SortOrder {
    fn from(arg: AccountSortArg) -> Self {
        match arg {
            AccountSortArg::Number => SortOrder::KeyAsc,
            AccountSortArg::Holder => SortOrder::NameAsc,
            AccountSortArg::BalanceAsc => SortOrder::MeasureAsc,
            AccountSortArg::BalanceDesc => SortOrder::MeasureDesc,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StudentFieldArg {
    #[value(name = "name")]
    Name,
    #[value(name = "email")]
    Email,
    #[value(name = "phone")]
    Phone,
}

#[derive(Subcommand, Clone, Debug)]
pub enum StudentCommands {
    /// Add a new student
    Add {
        /// Student name
        name: String,

        /// Marks (0..100)
        #[arg(long)]
        marks: f64,

        /// Contact email
        #[arg(long, default_value = "")]
        email: String,

        /// Contact phone
        #[arg(long, default_value = "")]
        phone: String,
    },

    /// List students in insertion order
    List,

    /// Show one student
    Show {
        /// Student ID
        id: u64,
    },

    /// Update an existing student; omitted fields are kept
    Update {
        /// Student ID
        id: u64,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New marks (0..100)
        #[arg(long, allow_negative_numbers = true)]
        marks: Option<f64>,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New phone
        #[arg(long)]
        phone: Option<String>,
    },

    /// Delete a student
    Delete {
        /// Student ID
        id: u64,
    },

    /// Search students by a text field
    Find {
        /// Case-insensitive substring (or a regex with --regex)
        term: String,

        /// Field to search
        #[arg(long, value_enum, default_value = "name")]
        field: StudentFieldArg,

        /// Treat the term as a regular expression
        #[arg(long)]
        regex: bool,
    },

    /// List students in a chosen order
    Sort {
        /// Ordering
        #[arg(long, value_enum, default_value = "id")]
        by: StudentSortArg,
    },

    /// Count, mean/min/max marks and grade distribution
    Stats,

    /// Load the five sample students into an empty register
    Seed,
}

#[derive(Subcommand, Clone, Debug)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account number
        number: String,

        /// Account holder name
        holder: String,

        /// Initial deposit
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        initial: f64,
    },

    /// Deposit money
    Deposit {
        /// Account number
        number: String,

        /// Amount to deposit
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },

    /// Withdraw money
    Withdraw {
        /// Account number
        number: String,

        /// Amount to withdraw
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },

    /// Show balance and summary for one account
    Show {
        /// Account number
        number: String,
    },

    /// Show the transaction history of one account
    History {
        /// Account number
        number: String,
    },

    /// Change the account holder name
    Rename {
        /// Account number
        number: String,

        /// New holder name
        holder: String,
    },

    /// Close (delete) an account
    Close {
        /// Account number
        number: String,
    },

    /// List all accounts
    List {
        /// Ordering
        #[arg(long, value_enum, default_value = "number")]
        by: AccountSortArg,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum LibraryCommands {
    /// Add a book
    AddBook {
        /// ISBN
        isbn: String,

        /// Title
        title: String,

        /// Author
        #[arg(long, default_value = "")]
        author: String,
    },

    /// Change a book's title or author; omitted fields are kept
    UpdateBook {
        /// ISBN
        isbn: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New author
        #[arg(long)]
        author: Option<String>,
    },

    /// Remove a book that is not lent out
    RemoveBook {
        /// ISBN
        isbn: String,
    },

    /// Register a member
    AddMember {
        /// User ID
        user_id: String,

        /// Member name
        name: String,
    },

    /// Remove a member who holds no books
    RemoveMember {
        /// User ID
        user_id: String,
    },

    /// Lend a book to a member
    Borrow {
        /// User ID
        user_id: String,

        /// ISBN
        isbn: String,
    },

    /// Take a book back from the member holding it
    Return {
        /// User ID
        user_id: String,

        /// ISBN
        isbn: String,
    },

    /// List all books
    Books,

    /// List books currently available
    Available,

    /// List members and their holdings
    Members,

    /// Load the sample catalogue into an empty library
    Seed,
}

#[derive(Subcommand, Clone, Debug)]
pub enum NotesCommands {
    /// List all notes
    List,

    /// Append a note
    Add {
        /// Note text (one line)
        text: String,
    },

    /// Delete a note by number
    Delete {
        /// 1-based note number
        number: usize,
    },

    /// Search notes (case-insensitive)
    Search {
        /// Search term
        term: String,
    },
}
