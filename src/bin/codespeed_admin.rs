use anyhow::anyhow;
use clap::Parser;
use codespeed::models::{NewUser, User};
use codespeed::store::{DieselStore, Lookups, Table};
use dotenv::dotenv;

#[derive(Parser, Debug)]
#[clap(name = "codespeed-admin", about = "Manage codespeed API users")]
enum Command {
    /// Create a user and print its API key
    CreateUser {
        username: String,
        #[clap(long, default_value = "")]
        email: String,
        #[clap(long)]
        password: String,
    },
    /// Print the API key of an existing user
    ShowKey { username: String },
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let command = Command::parse();
    let store = DieselStore::connect()?;

    match command {
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            let new = NewUser::register(&username, &email, &password)?;
            let user = Table::<User>::insert(&store, new)?;
            println!("Created user {} (id {})", user.username, user.id);
            println!("API key: {}", user.api_key);
        }
        Command::ShowKey { username } => {
            let user = store
                .user_by_username(&username)?
                .ok_or_else(|| anyhow!("no user named {}", username))?;
            println!("{}", user.api_key);
        }
    }

    Ok(())
}
