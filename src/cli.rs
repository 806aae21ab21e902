//! Command-line interface over the ledger core.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pocketbook::{
    core::{
        Ledger, Session,
        account::{add_account, delete_account, list_accounts, rename_account},
        event::{
            EntryType, EventBody, EventEdit, LedgerEvent, NewPeerTransfer, NewTransaction,
            NewTransfer, today,
        },
        projection::{audit, snapshot},
        setup::{NewUser, OpeningBalances, initialize_user},
        transaction::{
            create_peer_transfer, create_transaction, create_transfer, delete_transaction,
            edit_transaction,
        },
    },
    errors::Result,
};
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(name = "pocketbook", version, about = "Personal cash and bank ledger")]
pub struct Cli {
    /// Authenticated user id every command acts for
    #[arg(long, env = "POCKETBOOK_USER")]
    pub user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set up the user with opening cash and bank balances
    Init {
        #[arg(long, default_value = "0")]
        cash: Decimal,
        #[arg(long, default_value = "0")]
        bank: Decimal,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// List accounts and balances
    Accounts,
    /// Open an additional bank account
    AddAccount {
        name: String,
        #[arg(long, default_value = "0")]
        initial: Decimal,
    },
    RenameAccount {
        id: String,
        name: String,
    },
    DeleteAccount {
        id: String,
    },
    /// Record income
    Income(EntryArgs),
    /// Record an expense
    Expense(EntryArgs),
    /// Move money between two accounts
    Transfer(TransferArgs),
    /// Pay someone outside the ledger
    Pay(PayArgs),
    /// Replace an existing transaction
    Edit {
        id: String,
        #[command(subcommand)]
        edit: EditCommand,
    },
    /// Delete a transaction and reverse its effect
    Delete {
        id: String,
    },
    /// Print accounts, transactions and categories
    Show,
    /// Check every balance against the transaction log
    Audit,
}

#[derive(Debug, Subcommand)]
pub enum EditCommand {
    Income(EntryArgs),
    Expense(EntryArgs),
    Transfer(TransferArgs),
    Pay(PayArgs),
}

#[derive(Debug, Args)]
pub struct EntryArgs {
    pub account: String,
    pub amount: Decimal,
    pub category: String,
    /// Defaults to today (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
}

impl EntryArgs {
    fn request(self, entry_type: EntryType) -> NewTransaction {
        NewTransaction {
            account_id: self.account,
            entry_type,
            amount: self.amount,
            category: self.category,
            date: self.date.unwrap_or_else(today),
            description: self.description,
        }
    }
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
}

impl From<TransferArgs> for NewTransfer {
    fn from(args: TransferArgs) -> Self {
        Self {
            from_account_id: args.from,
            to_account_id: args.to,
            amount: args.amount,
            date: args.date.unwrap_or_else(today),
            description: args.description,
        }
    }
}

#[derive(Debug, Args)]
pub struct PayArgs {
    pub account: String,
    pub amount: Decimal,
    pub recipient: String,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
}

impl From<PayArgs> for NewPeerTransfer {
    fn from(args: PayArgs) -> Self {
        Self {
            account_id: args.account,
            amount: args.amount,
            recipient: args.recipient,
            date: args.date.unwrap_or_else(today),
            description: args.description,
        }
    }
}

impl From<EditCommand> for EventEdit {
    fn from(command: EditCommand) -> Self {
        match command {
            EditCommand::Income(args) => Self::Entry(args.request(EntryType::Income)),
            EditCommand::Expense(args) => Self::Entry(args.request(EntryType::Expense)),
            EditCommand::Transfer(args) => Self::Transfer(args.into()),
            EditCommand::Pay(args) => Self::PeerTransfer(args.into()),
        }
    }
}

/// Runs one command for the session's user.
pub async fn run(ledger: &Ledger, session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Init {
            cash,
            bank,
            email,
            name,
        } => {
            initialize_user(
                ledger,
                session,
                NewUser {
                    email,
                    display_name: name,
                },
                OpeningBalances { cash, bank },
            )
            .await?;
            println!("Initialized {} (cash {cash}, bank {bank})", session.user_id());
        }
        Command::Accounts => {
            for account in list_accounts(ledger.database(), session).await? {
                println!(
                    "{:<38} {:<20} {:<5} {:>12}",
                    account.id, account.name, account.account_type, account.balance
                );
            }
        }
        Command::AddAccount { name, initial } => {
            let account = add_account(ledger, session, &name, initial).await?;
            println!("Added account '{}' ({})", account.name, account.id);
        }
        Command::RenameAccount { id, name } => {
            let account = rename_account(ledger, session, &id, &name).await?;
            println!("Renamed {id} to '{}'", account.name);
        }
        Command::DeleteAccount { id } => {
            delete_account(ledger, session, &id).await?;
            println!("Deleted account {id}");
        }
        Command::Income(args) => {
            let event = create_transaction(ledger, session, args.request(EntryType::Income)).await?;
            println!("{}", describe(&event));
        }
        Command::Expense(args) => {
            let event = create_transaction(ledger, session, args.request(EntryType::Expense)).await?;
            println!("{}", describe(&event));
        }
        Command::Transfer(args) => {
            let event = create_transfer(ledger, session, args.into()).await?;
            println!("{}", describe(&event));
        }
        Command::Pay(args) => {
            let event = create_peer_transfer(ledger, session, args.into()).await?;
            println!("{}", describe(&event));
        }
        Command::Edit { id, edit } => {
            let event = edit_transaction(ledger, session, &id, edit.into()).await?;
            println!("{}", describe(&event));
        }
        Command::Delete { id } => {
            let event = delete_transaction(ledger, session, &id).await?;
            println!("Deleted {}", describe(&event));
        }
        Command::Show => {
            let view = snapshot(ledger, session).await?;
            println!("Total balance: {}", view.total_balance());
            for account in &view.accounts {
                println!("  {:<20} {:>12}", account.name, account.balance);
            }
            println!();
            for event in &view.transactions {
                println!("{}", describe(event));
            }
            println!();
            println!("Income categories: {}", view.categories.income.join(", "));
            println!("Expense categories: {}", view.categories.expense.join(", "));
        }
        Command::Audit => {
            let mut clean = true;
            for account in audit(ledger, session).await? {
                if !account.is_consistent() {
                    clean = false;
                    println!(
                        "{} ({}): recorded {}, expected {}",
                        account.name, account.account_id, account.recorded, account.expected
                    );
                }
            }
            if clean {
                println!("All balances match the transaction log");
            }
        }
    }
    Ok(())
}

fn describe(event: &LedgerEvent) -> String {
    let what = match &event.body {
        EventBody::Income(entry) => format!(
            "income  {} to {} [{}]",
            entry.amount, entry.account_name, entry.category
        ),
        EventBody::Expense(entry) => format!(
            "expense {} from {} [{}]",
            entry.amount, entry.account_name, entry.category
        ),
        EventBody::Transfer(transfer) => format!(
            "transfer {} from {} to {}",
            transfer.amount, transfer.from_name, transfer.to_name
        ),
        EventBody::PeerTransfer(payment) => format!(
            "paid {} from {} to {}",
            payment.amount, payment.from_name, payment.recipient
        ),
    };
    let note = event
        .description
        .as_deref()
        .map(|text| format!(" - {text}"))
        .unwrap_or_default();
    format!("{} {} {what}{note}", event.date, event.id)
}
