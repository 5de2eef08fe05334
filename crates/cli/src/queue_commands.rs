use {
    anyhow::Result,
    clap::Subcommand,
    crispy_models::{Queue, SessionId, Sessions},
};

#[derive(Subcommand)]
pub enum QueueAction {
    /// Print the number of waiting jobs.
    Length { jobtype: String },
    /// Enqueue an existing session.
    Submit { jobtype: String, id: SessionId },
    /// Pop the oldest job and print its session key. Prints nothing when
    /// the queue is empty.
    Next { jobtype: String },
}

pub async fn handle_queue(sessions: &Sessions, action: QueueAction) -> Result<()> {
    match action {
        QueueAction::Length { jobtype } => {
            let queue = Queue::new(sessions.store().clone(), jobtype)?;
            println!("{}", queue.length().await?);
        },
        QueueAction::Submit { jobtype, id } => {
            let queue = Queue::new(sessions.store().clone(), jobtype)?;
            let session = sessions.load(id).await?;
            let len = queue.submit(&session).await?;
            println!("{len}");
        },
        QueueAction::Next { jobtype } => {
            let queue = Queue::new(sessions.store().clone(), jobtype)?;
            if let Some(reference) = queue.next().await? {
                println!("{reference}");
            }
        },
    }
    Ok(())
}
