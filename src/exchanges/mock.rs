use crate::bars::{Bar, Timeframe};
use crate::core::events::StreamEvent;
use crate::engine::dispatcher::OrderIntent;
use crate::engine::event_loop::{ExchangeSession, SessionError};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Scripted exchange session for tests and dry runs: plays back a fixed
/// event sequence and records everything submitted against it.
#[derive(Default)]
pub struct MockSession {
    events: VecDeque<Result<StreamEvent, SessionError>>,
    seeds: Vec<(Timeframe, Vec<Bar>)>,
    submissions: Vec<OrderIntent>,
    connects: u32,
    pings: u32,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one event for playback.
    pub fn push_event(&mut self, event: StreamEvent) {
        self.events.push_back(Ok(event));
    }

    /// Queue a stream error for playback (decode errors are survivable,
    /// transport errors end the session).
    pub fn push_error(&mut self, error: SessionError) {
        self.events.push_back(Err(error));
    }

    /// History handed out by `fetch_history`.
    pub fn set_seed(&mut self, timeframe: Timeframe, bars: Vec<Bar>) {
        self.seeds.push((timeframe, bars));
    }

    pub fn submissions(&self) -> &[OrderIntent] {
        &self.submissions
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn pings(&self) -> u32 {
        self.pings
    }
}

#[async_trait]
impl ExchangeSession for MockSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        self.connects += 1;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<StreamEvent, SessionError>> {
        self.events.pop_front()
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.pings += 1;
        Ok(())
    }

    async fn fetch_history(&mut self) -> Result<Vec<(Timeframe, Vec<Bar>)>, SessionError> {
        Ok(self.seeds.clone())
    }

    async fn submit(&mut self, intent: &OrderIntent) -> Result<(), SessionError> {
        self.submissions.push(intent.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_plays_back_in_order() {
        let mut session = MockSession::new();
        session.push_event(StreamEvent::AuthAck { success: true });
        session.push_event(StreamEvent::Pong);

        assert!(matches!(
            session.next_event().await,
            Some(Ok(StreamEvent::AuthAck { success: true }))
        ));
        assert!(matches!(
            session.next_event().await,
            Some(Ok(StreamEvent::Pong))
        ));
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_records_submissions() {
        let mut session = MockSession::new();
        session.submit(&OrderIntent::CancelAll).await.unwrap();
        assert_eq!(session.submissions(), &[OrderIntent::CancelAll]);
    }
}
