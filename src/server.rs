use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use warp::Filter;

use crate::engine::Action;
use crate::q_agent::state_key;
use crate::q_table::QTable;
use crate::transport::{PredictRequest, PredictResponse, StatusResponse, TrainRequest};

/// HTTP inference service: greedy prediction and one-step updates over a
/// shared tabular model, with JSON persistence at `model_path`. Speaks the
/// same protocol the remote agent consumes.
#[tokio::main]
pub(crate) async fn run_http_server(port: u16, model_path: PathBuf) {
    let table = Arc::new(Mutex::new(QTable::new()));

    let table_clone = Arc::clone(&table);
    let predict = warp::path("predict")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |request: PredictRequest| {
            let mut table = table_clone.lock().unwrap();
            let action = table.greedy_action(&state_key(&request.state));
            warp::reply::json(&PredictResponse {
                action: action.index(),
            })
        });

    let table_clone = Arc::clone(&table);
    let train = warp::path("train")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |request: TrainRequest| {
            let reply = match Action::from_index(request.action) {
                Some(action) => {
                    let mut table = table_clone.lock().unwrap();
                    table.update(
                        &state_key(&request.state),
                        action,
                        request.reward,
                        &state_key(&request.next_state),
                    );
                    StatusResponse::success()
                }
                None => StatusResponse::error(format!("unknown action index {}", request.action)),
            };
            warp::reply::json(&reply)
        });

    let table_clone = Arc::clone(&table);
    let save_path = model_path.clone();
    let save_model = warp::path("save_model").and(warp::post()).map(move || {
        let table = table_clone.lock().unwrap();
        let reply = match table.save(&save_path) {
            Ok(()) => {
                println!("model saved ({} states)", table.len());
                StatusResponse::success()
            }
            Err(err) => StatusResponse::error(err.to_string()),
        };
        warp::reply::json(&reply)
    });

    let table_clone = Arc::clone(&table);
    let load_model = warp::path("load_model").and(warp::post()).map(move || {
        let reply = match QTable::load(&model_path) {
            Ok(loaded) => {
                println!("model loaded ({} states)", loaded.len());
                *table_clone.lock().unwrap() = loaded;
                StatusResponse::success()
            }
            Err(_) => StatusResponse::error("model not found"),
        };
        warp::reply::json(&reply)
    });

    let routes = predict.or(train).or(save_model).or(load_model);
    println!("inference service listening on 127.0.0.1:{port}");
    warp::serve(routes).run(([127, 0, 0, 1], port)).await;
}
