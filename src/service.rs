//! Index Service
//!
//! Gives async callers serialized access to a [`TimeSeriesDb`]. The database
//! is moved onto a single blocking worker that drains a command queue, so
//! every insertion and query runs to completion before the next begins and
//! the tree needs no internal locking.
//!
//! ```text
//! IndexHandle ──┐
//! IndexHandle ──┼──▶ mpsc::channel<Command> ──▶ worker (owns TimeSeriesDb)
//! IndexHandle ──┘                                   │
//!        ▲                                          │
//!        └──────────── oneshot reply ◀──────────────┘
//! ```

use crate::db::{AggregationType, Bucket, DbError, DbResult, DbStats, Interval, TimeSeriesDb};
use crate::storage::{Reading, Record, RecordFilter, RecordId, RecordStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Commands buffered before senders wait
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

type Reply<T> = oneshot::Sender<DbResult<T>>;

enum Command {
    Record {
        reading: Reading,
        reply: Reply<RecordId>,
    },
    Query {
        start: i64,
        end: i64,
        filter: RecordFilter,
        reply: Reply<Vec<Record>>,
    },
    Aggregate {
        start: i64,
        end: i64,
        metric: String,
        aggregation: AggregationType,
        reply: Reply<f64>,
    },
    Downsample {
        start: i64,
        end: i64,
        metric: String,
        interval: Interval,
        reply: Reply<Vec<Bucket>>,
    },
    UpdateValue {
        id: RecordId,
        value: f64,
        reply: Reply<bool>,
    },
    Delete {
        id: RecordId,
        reply: Reply<bool>,
    },
    Stats {
        reply: Reply<DbStats>,
    },
}

impl Command {
    fn apply<S: RecordStore>(self, db: &mut TimeSeriesDb<S>) {
        // A dropped receiver means the caller gave up; nothing to do
        match self {
            Command::Record { reading, reply } => {
                let _ = reply.send(db.record(&reading));
            }
            Command::Query {
                start,
                end,
                filter,
                reply,
            } => {
                let _ = reply.send(db.query_filtered(start, end, &filter));
            }
            Command::Aggregate {
                start,
                end,
                metric,
                aggregation,
                reply,
            } => {
                let _ = reply.send(db.aggregate(start, end, &metric, aggregation));
            }
            Command::Downsample {
                start,
                end,
                metric,
                interval,
                reply,
            } => {
                let _ = reply.send(db.downsample(start, end, &metric, interval));
            }
            Command::UpdateValue { id, value, reply } => {
                let _ = reply.send(db.update_value(id, value));
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(db.delete(id));
            }
            Command::Stats { reply } => {
                let _ = reply.send(db.stats());
            }
        }
    }
}

/// Owner of the worker task
pub struct IndexService<S> {
    handle: IndexHandle,
    worker: JoinHandle<TimeSeriesDb<S>>,
}

impl<S: RecordStore + Send + 'static> IndexService<S> {
    /// Move `db` onto a dedicated worker and start serving commands
    pub fn spawn(db: TimeSeriesDb<S>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(queue_depth.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            let mut db = db;
            tracing::debug!("Index service started");
            while let Some(command) = rx.blocking_recv() {
                command.apply(&mut db);
            }
            tracing::debug!("Index service stopped");
            db
        });

        Self {
            handle: IndexHandle { tx },
            worker,
        }
    }

    /// A cloneable handle for submitting commands
    pub fn handle(&self) -> IndexHandle {
        self.handle.clone()
    }

    /// Stop accepting commands and return the database once every
    /// outstanding handle has been dropped.
    pub async fn shutdown(self) -> DbResult<TimeSeriesDb<S>> {
        drop(self.handle);
        self.worker.await.map_err(|e| {
            tracing::error!("Index service worker failed: {}", e);
            DbError::ServiceClosed
        })
    }
}

/// Async front door to the index service
#[derive(Clone)]
pub struct IndexHandle {
    tx: mpsc::Sender<Command>,
}

impl IndexHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> DbResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DbError::ServiceClosed)?;
        response.await.map_err(|_| DbError::ServiceClosed)?
    }

    pub async fn record(&self, reading: Reading) -> DbResult<RecordId> {
        self.call(|reply| Command::Record { reading, reply }).await
    }

    pub async fn query(&self, start: i64, end: i64) -> DbResult<Vec<Record>> {
        self.query_filtered(start, end, RecordFilter::new()).await
    }

    pub async fn query_filtered(
        &self,
        start: i64,
        end: i64,
        filter: RecordFilter,
    ) -> DbResult<Vec<Record>> {
        self.call(|reply| Command::Query {
            start,
            end,
            filter,
            reply,
        })
        .await
    }

    pub async fn aggregate(
        &self,
        start: i64,
        end: i64,
        metric: impl Into<String>,
        aggregation: AggregationType,
    ) -> DbResult<f64> {
        let metric = metric.into();
        self.call(|reply| Command::Aggregate {
            start,
            end,
            metric,
            aggregation,
            reply,
        })
        .await
    }

    pub async fn downsample(
        &self,
        start: i64,
        end: i64,
        metric: impl Into<String>,
        interval: Interval,
    ) -> DbResult<Vec<Bucket>> {
        let metric = metric.into();
        self.call(|reply| Command::Downsample {
            start,
            end,
            metric,
            interval,
            reply,
        })
        .await
    }

    pub async fn update_value(&self, id: RecordId, value: f64) -> DbResult<bool> {
        self.call(|reply| Command::UpdateValue { id, value, reply })
            .await
    }

    pub async fn delete(&self, id: RecordId) -> DbResult<bool> {
        self.call(|reply| Command::Delete { id, reply }).await
    }

    pub async fn stats(&self) -> DbResult<DbStats> {
        self.call(|reply| Command::Stats { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SeparatorPolicy;
    use crate::storage::MemoryStore;

    fn spawn_service() -> IndexService<MemoryStore> {
        let db = TimeSeriesDb::new(MemoryStore::new(), 4, SeparatorPolicy::Retain).unwrap();
        IndexService::spawn(db, DEFAULT_QUEUE_DEPTH)
    }

    #[tokio::test]
    async fn test_record_and_query_through_service() {
        let service = spawn_service();
        let handle = service.handle();

        for t in [1, 5, 3, 9, 7] {
            handle
                .record(Reading::new(t, "Station_1", "temperature", t as f64))
                .await
                .unwrap();
        }

        let records = handle.query(2, 8).await.unwrap();
        assert_eq!(records.len(), 3);

        let avg = handle
            .aggregate(0, 10, "temperature", AggregationType::Avg)
            .await
            .unwrap();
        assert_eq!(avg, 5.0);

        drop(handle);
        let db = service.shutdown().await.unwrap();
        assert_eq!(db.index().len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let service = spawn_service();

        let mut tasks = Vec::new();
        for writer in 0..8i64 {
            let handle = service.handle();
            tasks.push(tokio::spawn(async move {
                for i in 0..50i64 {
                    let ts = writer * 1_000 + i;
                    handle
                        .record(Reading::new(ts, format!("Station_{}", writer), "humidity", 1.0))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = service.handle();
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.records, 400);
        assert_eq!(stats.index.entries, 400);

        let station_three = handle
            .query_filtered(0, 10_000, RecordFilter::new().station("Station_3"))
            .await
            .unwrap();
        assert_eq!(station_three.len(), 50);

        drop(handle);
        let db = service.shutdown().await.unwrap();
        db.index().validate().unwrap();
    }

    #[tokio::test]
    async fn test_update_delete_and_downsample() {
        let service = spawn_service();
        let handle = service.handle();

        let id = handle
            .record(Reading::new(0, "Station_1", "temperature", 10.0))
            .await
            .unwrap();
        assert!(handle.update_value(id, 12.0).await.unwrap());

        let buckets = handle
            .downsample(0, 0, "temperature", Interval::Hourly)
            .await
            .unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].value, 12.0);

        assert!(handle.delete(id).await.unwrap());
        assert!(handle.query(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_downsample_keeps_worker_alive() {
        let service = spawn_service();
        let handle = service.handle();

        let err = handle
            .downsample(i64::MIN, i64::MAX, "temperature", Interval::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidRange(_)));

        handle
            .record(Reading::new(5, "Station_1", "temperature", 1.0))
            .await
            .unwrap();
        assert_eq!(handle.stats().await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn test_closed_service_reports_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = IndexHandle { tx };

        assert!(matches!(handle.stats().await, Err(DbError::ServiceClosed)));
        assert!(matches!(
            handle.query(0, 10).await,
            Err(DbError::ServiceClosed)
        ));
    }
}
