use {
    anyhow::Result,
    clap::Subcommand,
    crispy_models::{SessionId, SessionPatch, Sessions},
};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create a session from an antiSMASH job id or an input file.
    Create {
        /// antiSMASH job id.
        #[arg(long)]
        asid: Option<String>,
        /// Input file reference.
        #[arg(long)]
        file: Option<String>,
    },
    /// Print a session record as JSON.
    Show { id: SessionId },
    /// Set the state (and optionally the error message) of a session.
    SetState {
        id: SessionId,
        state: String,
        #[arg(long)]
        error: Option<String>,
    },
}

pub async fn handle_session(sessions: &Sessions, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Create { asid, file } => {
            let session = sessions
                .create_from(asid.as_deref(), file.as_deref())
                .await?;
            println!("{}", session.id());
        },
        SessionAction::Show { id } => {
            let record = sessions.load(id).await?.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        },
        SessionAction::SetState { id, state, error } => {
            let session = sessions.load(id).await?;
            // State and error land together with the timestamp.
            let patch = SessionPatch {
                state: Some(state),
                error,
                ..Default::default()
            };
            session.apply(&patch).await?;
        },
    }
    Ok(())
}
