use clap::Subcommand;
use habitloom_core::storage::TemplatePatch;

use crate::common;

#[derive(Subcommand)]
pub enum TemplateAction {
    /// Create a habit template
    Add {
        /// Display name
        name: String,
        /// XP awarded per completion
        #[arg(long)]
        xp: i64,
        /// Category the habit belongs to
        #[arg(long, default_value = "general")]
        category: String,
        /// Optional subtitle
        #[arg(long)]
        subtitle: Option<String>,
        /// Mark as a core habit
        #[arg(long)]
        core: bool,
    },
    /// List templates, optionally filtered by category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Update a template
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        xp: Option<i64>,
        #[arg(long)]
        subtitle: Option<String>,
        #[arg(long)]
        core: Option<bool>,
    },
    /// Delete a template
    Delete { id: String },
}

pub fn run(action: TemplateAction, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = common::open_coordinator()?;
    let now = chrono::Utc::now();

    match action {
        TemplateAction::Add {
            name,
            xp,
            category,
            subtitle,
            core,
        } => {
            let template = coordinator.db().create_template(
                coordinator.config(),
                user,
                &category,
                &name,
                subtitle.as_deref(),
                xp,
                core,
                now,
            )?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        TemplateAction::List { category } => {
            let templates = coordinator.db().list_templates(user, category.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
        TemplateAction::Update {
            id,
            name,
            xp,
            subtitle,
            core,
        } => {
            let template = coordinator.db().update_template(
                coordinator.config(),
                user,
                &id,
                TemplatePatch {
                    name,
                    subtitle,
                    xp_value: xp,
                    is_core: core,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        TemplateAction::Delete { id } => {
            coordinator.db().delete_template(user, &id)?;
            println!("deleted {id}");
        }
    }
    Ok(())
}
