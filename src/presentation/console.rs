// Console presenter - Operator log pane for a run in progress
use crate::application::events::{EngineEvent, EventRecord, EventStream, RunStatus};
use crate::domain::test_run::CompletedRun;
use futures::StreamExt;

pub fn format_record(record: &EventRecord) -> String {
    format!("{} {}", record.at.format("%Y-%m-%d %H:%M:%S"), record.event)
}

/// Print events until every producer is gone. Returns the terminal status
/// if one was seen.
pub async fn render_events(mut events: EventStream) -> Option<RunStatus> {
    let mut status = None;
    while let Some(record) = events.next().await {
        println!("{}", format_record(&record));
        if let EngineEvent::RunFinished(finished) = &record.event {
            status = Some(finished.clone());
        }
    }
    status
}

/// Plain-text rendering of the result matrix, one line per channel.
pub fn render_summary(run: &CompletedRun) -> String {
    let matrix = run.matrix();
    let mut lines = vec![matrix.column_titles(run.tolerance()).join(" | ")];

    for row in matrix.rows() {
        let mut fields = vec![
            row.sequence.to_string(),
            row.channel.metadata.label.clone(),
            row.channel.metadata.method.clone(),
        ];
        fields.extend(
            row.cells
                .iter()
                .map(|cell| cell.map_or_else(String::new, |c| c.value.to_string())),
        );
        fields.push(row.verdict.to_string());
        fields.push(row.channel.metadata.description.clone());
        lines.push(fields.join(" | "));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::AbortReason;
    use crate::application::events::EventSink;
    use chrono::{Local, TimeZone};

    #[test]
    fn test_format_record() {
        let record = EventRecord {
            at: Local.with_ymd_and_hms(2023, 6, 2, 8, 33, 0).unwrap(),
            event: EngineEvent::ColumnWritten { node_index: 1 },
        };

        assert_eq!(format_record(&record), "2023-06-02 08:33:00 node 2: channel data recorded");
    }

    #[tokio::test]
    async fn test_render_events_reports_terminal_status() {
        let (sink, stream) = EventSink::channel();
        let reason = AbortReason::NodeTimeout {
            node_index: 0,
            last_observed: 3.1,
        };
        sink.emit(EngineEvent::Connected);
        sink.emit(EngineEvent::RunFinished(RunStatus::Aborted(reason.clone())));
        drop(sink);

        let status = render_events(stream).await;

        assert_eq!(status, Some(RunStatus::Aborted(reason)));
    }
}
