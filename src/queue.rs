use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::{
    desk::Desk,
    telegram::{ChatTransport, InboundUpdate},
};

/// Consumes webhook updates one at a time. An update's store write finishes
/// before its replies go out; a failed update is logged and dropped.
pub fn spawn_update_worker<T>(
    desk: Desk,
    transport: Arc<T>,
    mut updates_rx: mpsc::Receiver<InboundUpdate>,
) where
    T: ChatTransport + 'static,
{
    tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            let update_id = update.update_id;
            if let Err(err) = process_update(&desk, transport.as_ref(), update).await {
                error!(update_id, "Chat update failed: {err:#}");
            }
        }
        info!("Update queue closed, worker exiting");
    });
}

pub async fn process_update<T>(desk: &Desk, transport: &T, update: InboundUpdate) -> Result<()>
where
    T: ChatTransport,
{
    let outcome = desk.handle(&update.event).await;

    if outcome.acknowledge_button {
        if let Some(callback_id) = &update.callback_id {
            transport.answer_button(callback_id).await?;
        }
    }

    let Some(chat_id) = update.chat_id else {
        return Ok(());
    };
    for reply in &outcome.replies {
        transport.send_reply(chat_id, reply).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desk::{ChatEvent, ReplyFormat},
        store::RecordStore,
        telegram::testing::{RecordingTransport, SentCall},
    };

    fn text_update(chat_id: i64, text: &str) -> InboundUpdate {
        InboundUpdate {
            update_id: 1,
            chat_id: Some(chat_id),
            callback_id: None,
            event: ChatEvent::Text {
                text: text.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn button_is_answered_before_reply() {
        let desk = Desk::new(RecordStore::memory());
        let transport = RecordingTransport::default();
        let update = InboundUpdate {
            update_id: 2,
            chat_id: Some(5),
            callback_id: Some("cb-9".to_string()),
            event: ChatEvent::Button {
                action_id: "CONTACTO".to_string(),
            },
        };

        process_update(&desk, &transport, update).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            SentCall::Answer {
                callback_id: "cb-9".to_string()
            }
        );
        assert!(matches!(&calls[1], SentCall::Reply { chat_id: 5, .. }));
    }

    #[tokio::test]
    async fn end_to_end_pre_checkin_flow() {
        let store = RecordStore::memory();
        let desk = Desk::new(store.clone());
        let transport = RecordingTransport::default();

        process_update(&desk, &transport, text_update(3, "García 78421"))
            .await
            .unwrap();
        let records = store.latest(5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_name, "García");
        assert_eq!(records[0].booking_number, "78421");

        let calls = transport.calls();
        let SentCall::Reply { chat_id, reply } = &calls[0] else {
            panic!("expected a reply, got {calls:?}");
        };
        assert_eq!(*chat_id, 3);
        assert_eq!(reply.format, ReplyFormat::Markdown);

        process_update(&desk, &transport, text_update(3, "García 123"))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn send_failures_surface_as_errors() {
        let store = RecordStore::memory();
        let desk = Desk::new(store.clone());
        let transport = RecordingTransport {
            fail_replies: true,
            ..Default::default()
        };

        let result = process_update(&desk, &transport, text_update(3, "Soto 55555")).await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn worker_drains_queue_in_order() {
        let store = RecordStore::memory();
        let transport = Arc::new(RecordingTransport::default());
        let (tx, rx) = mpsc::channel(8);
        spawn_update_worker(Desk::new(store.clone()), Arc::clone(&transport), rx);

        tx.send(text_update(1, "Alba 1111")).await.unwrap();
        tx.send(text_update(1, "Bravo 2222")).await.unwrap();
        drop(tx);

        for _ in 0..100 {
            if transport.calls().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let ids: Vec<i64> = store.latest(5).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
        let names: Vec<String> = store
            .latest(5)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.last_name)
            .collect();
        assert_eq!(names, vec!["Bravo".to_string(), "Alba".to_string()]);
    }
}
