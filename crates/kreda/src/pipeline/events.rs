// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Kreda Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Pipeline event stream for progressive rendering. The UI subscribes
//! to an ordered channel instead of handing the core a callback.

use super::conversation::Message;
use super::Phase;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted { stage: Phase },
    MessageAppended { message: Message },
    StageFailed { stage: Phase, error: String },
}

/// Send half held by the controller. A dropped receiver silently
/// disables delivery; the pipeline itself never blocks on the UI.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiverStream<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            UnboundedReceiverStream::new(receiver),
        )
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
