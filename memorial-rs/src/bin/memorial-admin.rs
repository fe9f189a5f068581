//! CLI tool for managing memorial accounts
//!
//! # Usage
//!
//! ```bash
//! # Add an administrator
//! memorial-admin add kora password123 --db sqlite://memorial.db?mode=rwc
//!
//! # Add a read-only account
//! memorial-admin add guest password123 --role visitor
//!
//! # Delete, list, check
//! memorial-admin delete guest
//! memorial-admin list
//! memorial-admin exists kora
//! ```

use clap::{Parser, Subcommand};
use memorial_rs::security::{Authenticator, Role};

#[derive(Parser)]
#[command(name = "memorial-admin")]
#[command(about = "Manage memorial page accounts", long_about = None)]
struct Cli {
    /// Database URL (e.g., sqlite://memorial.db)
    #[arg(short, long, default_value = "sqlite://memorial.db?mode=rwc")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new user
    Add {
        username: String,
        password: String,
        /// admin or visitor
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
    /// Delete a user
    Delete { username: String },
    /// List all users
    List,
    /// Check if user exists
    Exists { username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let auth = Authenticator::new(&cli.db).await?;

    match cli.command {
        Commands::Add {
            username,
            password,
            role,
        } => {
            let role: Role = role.parse()?;
            if auth.user_exists(&username).await? {
                eprintln!("Error: User {} already exists", username);
                std::process::exit(1);
            }

            auth.add_user(&username, &password, role).await?;
            println!("✓ User {} added as {}", username, role);
        }
        Commands::Delete { username } => {
            if !auth.delete_user(&username).await? {
                eprintln!("Error: User {} does not exist", username);
                std::process::exit(1);
            }
            println!("✓ User {} deleted", username);
        }
        Commands::List => {
            let users = auth.list_users().await?;

            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<24} {:<10} {:<20} {:<20}", "Username", "Role", "Created At", "Last Login");
                println!("{:-<76}", "");

                for user in &users {
                    println!(
                        "{:<24} {:<10} {:<20} {:<20}",
                        user.username,
                        user.role,
                        user.created_at,
                        user.last_login.as_deref().unwrap_or("Never")
                    );
                }

                println!("\nTotal: {} user(s)", users.len());
            }
        }
        Commands::Exists { username } => match auth.role_of(&username).await? {
            Some(role) => println!("✓ User {} exists ({})", username, role),
            None => {
                println!("✗ User {} does not exist", username);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
