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

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kreda::collab::{HttpComputeClient, HttpModelClient, HttpProofClient, HttpRetrievalClient};
use kreda::pipeline::{EventSink, PipelineConfig, PipelineEvent, SolvePipeline};
use solver_contracts::EndpointConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kreda")]
#[command(about = "Rozwiązuje zadanie maturalne z matematyki przez potok plan/kod/wykonanie/podsumowanie.")]
struct Cli {
    /// Treść zadania.
    problem: String,

    /// Plik YAML nadpisujący konfigurację etapów.
    #[arg(long)]
    config: Option<String>,

    /// Wypisuje całą rozmowę jako JSON zamiast tekstu.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Pomija weryfikację formalną nawet dla zadań dowodowych.
    #[arg(long, default_value_t = false)]
    no_verify: bool,

    /// Pomija usługę wyszukiwania materiałów.
    #[arg(long, default_value_t = false)]
    no_retrieval: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug,reqwest=info,hyper=info,hyper_util=info"))
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let endpoints = EndpointConfig::from_env();
    info!(model = %endpoints.model.model, "starting solve");

    let pipeline_config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };

    let model = Arc::new(HttpModelClient::new(endpoints.model));
    let compute = Arc::new(HttpComputeClient::new(endpoints.compute));

    let cancel = CancellationToken::new();
    let (sink, mut events) = EventSink::channel();
    let mut pipeline = SolvePipeline::new(model, compute)
        .with_config(pipeline_config)
        .with_events(sink)
        .with_cancellation(cancel.clone());

    if !args.no_verify {
        let proof = HttpProofClient::new(endpoints.proof);
        if proof.is_reachable().await {
            pipeline = pipeline.with_proof(Arc::new(proof));
        } else {
            warn!("proof verifier not reachable, running without formal verification");
        }
    }
    if !args.no_retrieval {
        pipeline = pipeline.with_retrieval(Arc::new(HttpRetrievalClient::new(endpoints.retrieval)));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if quiet {
                continue;
            }
            match event {
                PipelineEvent::StageStarted { stage } => {
                    eprintln!("--- {stage:?} ---");
                }
                PipelineEvent::MessageAppended { message } => {
                    let label = message.agent_label.as_deref().unwrap_or("Uczeń");
                    println!("[{label}] {}", message.content);
                }
                PipelineEvent::StageFailed { stage, error } => {
                    eprintln!("!!! {stage:?}: {error}");
                }
            }
        }
    });

    let conversation = pipeline.solve(&args.problem).await?;
    drop(pipeline);
    let _ = printer.await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
    }
    Ok(())
}
