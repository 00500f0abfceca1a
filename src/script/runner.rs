//! 定时发送：每个发送点一个任务，互不等待

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::ScheduledSend;
use crate::executor::ChatPoster;

/// 按计划发送，返回成功发出的条数
///
/// 各发送点从同一时刻起算，到点即发；前一条发得慢不会推迟后面的时间点。
pub async fn run_schedule(sends: Vec<ScheduledSend>, poster: Arc<ChatPoster>) -> usize {
    let handles: Vec<_> = sends
        .into_iter()
        .map(|send| {
            let poster = Arc::clone(&poster);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(send.at_ms)).await;
                match poster.send(&send.text).await {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!(at_ms = send.at_ms, "Chat input unavailable, macro line dropped");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(at_ms = send.at_ms, error = %e, "Macro send failed");
                        false
                    }
                }
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(true)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UiLane;
    use crate::ui::MockUi;

    #[tokio::test]
    async fn test_sends_in_offset_order() {
        let ui = Arc::new(MockUi::new());
        let poster = Arc::new(ChatPoster::new(ui.clone(), UiLane::new(), Duration::ZERO));
        let sends = vec![
            ScheduledSend {
                at_ms: 40,
                text: "third".into(),
            },
            ScheduledSend {
                at_ms: 0,
                text: "first".into(),
            },
            ScheduledSend {
                at_ms: 20,
                text: "second".into(),
            },
        ];
        assert_eq!(run_schedule(sends, poster).await, 3);
        assert_eq!(ui.posts(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_missing_chat_input_counts_as_dropped() {
        let ui = Arc::new(MockUi::new());
        ui.set_chat_available(false);
        let poster = Arc::new(ChatPoster::new(ui.clone(), UiLane::new(), Duration::ZERO));
        let sends = vec![ScheduledSend {
            at_ms: 0,
            text: "x".into(),
        }];
        assert_eq!(run_schedule(sends, poster).await, 0);
    }
}
