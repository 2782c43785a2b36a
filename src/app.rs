use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, CatalogEntry, CatalogKind, CatalogSource, Saved, SubmissionGateway, SubmitError,
};
use crate::config::Config;
use crate::session::{FormSession, SessionStatus};
use crate::ui::{FormAction, RecordForm, TerminalGuard};

/// Results delivered back to the UI loop by background tasks
#[derive(Debug)]
pub enum AppEvent {
    Catalog(CatalogKind, Result<Vec<CatalogEntry>, ApiError>),
    Submitted(Result<Saved, SubmitError>),
}

pub struct App {
    config: Config,
    session: FormSession,
    form: RecordForm,
    catalogs: Arc<dyn CatalogSource>,
    gateway: Arc<dyn SubmissionGateway>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    /// In-flight submission, awaited on exit so a late save still clears its draft
    pending_submit: Option<JoinHandle<()>>,
    should_quit: bool,
}

impl App {
    pub fn new(
        config: Config,
        session: FormSession,
        catalogs: Arc<dyn CatalogSource>,
        gateway: Arc<dyn SubmissionGateway>,
    ) -> Self {
        let form = RecordForm::new(&session);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            session,
            form,
            catalogs,
            gateway,
            events_tx,
            events_rx,
            pending_submit: None,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Request every catalog the form needs, concurrently
    pub fn load_catalogs(&self) {
        for kind in self.session.catalog_kinds() {
            let source = Arc::clone(&self.catalogs);
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                let result = source.fetch(kind).await;
                // receiver is gone once the app has exited
                let _ = tx.send(AppEvent::Catalog(kind, result));
            });
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut guard = TerminalGuard::enter()?;
        self.load_catalogs();

        let tick_rate = self.config.tick_rate();

        while !self.should_quit {
            let terminal = guard.terminal()?;
            terminal.draw(|f| self.form.render(f, &self.session))?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            self.drain_events();
            self.session.tick(Instant::now());
        }

        drop(guard);
        self.finish().await;
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.form.handle_key(&mut self.session, key, Instant::now()) {
            FormAction::None => {}
            FormAction::Submit => self.submit(),
            FormAction::Close => self.close(),
        }
    }

    /// Apply every result that has arrived since the last call
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next background result and apply it
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::Catalog(kind, result) => self.session.apply_catalog(kind, result),
            AppEvent::Submitted(result) => {
                self.pending_submit = None;
                self.session.finish_submit(result);
            }
        }
        self.form.sync(&self.session);
    }

    fn submit(&mut self) {
        if matches!(self.session.status(), SessionStatus::Submitting) {
            debug!("submission already in flight");
            return;
        }
        if self.session.is_locked() {
            debug!("record already created, nothing to resubmit");
            return;
        }

        let ticket = match self.session.begin_submit() {
            Ok(ticket) => ticket,
            Err(issues) => {
                info!(count = issues.len(), "fix the highlighted fields before saving");
                self.form.sync(&self.session);
                return;
            }
        };

        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();
        self.pending_submit = Some(tokio::spawn(async move {
            if let Some(result) = ticket.send(gateway.as_ref()).await {
                let _ = tx.send(AppEvent::Submitted(result));
            }
        }));
        self.form.sync(&self.session);
    }

    fn close(&mut self) {
        let flushed = self.session.close();
        debug!(flushed, "form closed");
        self.should_quit = true;
    }

    /// Let an in-flight submission settle after the form has closed
    pub async fn finish(&mut self) {
        let Some(handle) = self.pending_submit.take() else {
            return;
        };
        let limit = self.config.api.timeout() + Duration::from_secs(1);
        eprintln!("Esperando a que termine el guardado…");
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "submission task failed"),
            Err(_) => warn!("gave up waiting for submission"),
        }
    }
}
