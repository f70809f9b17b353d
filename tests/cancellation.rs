/*
 * Copyright 2023 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::thread;
use std::time::{Duration, Instant};

use sqlite_blobstore::store::{KvStore, OpenStore, SqliteConfig, SqliteKv};
use sqlite_blobstore::{Cancellation, Context, Error};

use common::*;

mod common;

const TIMEOUT: Duration = Duration::from_millis(50);

#[rstest]
fn cancelled_context_fails_immediately(kv: WithTempDir<SqliteKv>) {
    let ctx = Context::background().child();
    ctx.cancel();

    assert_that!(kv.put(&ctx, b"key", b"value", false)).is_cancelled_by(Cancellation::Cancelled);
    assert_that!(kv.get(&ctx, b"key")).is_cancelled_by(Cancellation::Cancelled);
    assert_that!(kv.len(&ctx)).is_cancelled_by(Cancellation::Cancelled);
    assert_that!(kv.list(&ctx, b"")).is_cancelled_by(Cancellation::Cancelled);

    // Nothing was written.
    assert_eq!(kv.len(&Context::background()).unwrap(), 0);
}

#[rstest]
fn expired_deadline_fails_immediately(kv: WithTempDir<SqliteKv>) {
    let ctx = Context::background().with_deadline(Instant::now());

    assert_that!(kv.delete(&ctx, b"key")).is_cancelled_by(Cancellation::DeadlineExceeded);
}

#[rstest]
fn writer_times_out_while_listing_holds_lock(kv: WithTempDir<SqliteKv>) -> anyhow::Result<()> {
    let ctx = Context::background();
    let expected = numbered_keys("key", 300);
    for key in &expected {
        kv.put(&ctx, key, b"", false)?;
    }

    let mut keys = kv.list(&ctx, b"")?;
    assert_eq!(keys.next().transpose()?, Some(expected[0].clone()));

    // The listing hasn't finished, so it still holds the lock.
    let start = Instant::now();
    let result = kv.put(&ctx.with_timeout(TIMEOUT), b"other", b"value", false);
    assert_that!(result).is_cancelled_by(Cancellation::DeadlineExceeded);
    assert!(start.elapsed() >= TIMEOUT);

    // Stopping the listing early releases the lock.
    drop(keys);
    kv.put(&ctx.with_timeout(Duration::from_secs(10)), b"other", b"value", false)?;
    assert_eq!(kv.len(&ctx)?, 301);

    Ok(())
}

#[rstest]
fn blocked_writer_can_be_cancelled(kv: WithTempDir<SqliteKv>) -> anyhow::Result<()> {
    let ctx = Context::background();
    kv.put(&ctx, b"key", b"value", false)?;
    let keys = kv.list(&ctx, b"")?;

    let writer_ctx = ctx.child();
    let result = thread::scope(|scope| {
        let writer = scope.spawn(|| kv.put(&writer_ctx, b"other", b"value", false));
        thread::sleep(TIMEOUT);
        writer_ctx.cancel();
        writer.join().unwrap()
    });

    assert_that!(result).is_cancelled_by(Cancellation::Cancelled);
    drop(keys);
    assert_that!(kv.get(&ctx, b"other")).is_err_variant(Error::NotFound { key: Vec::new() });

    Ok(())
}

#[rstest]
fn listing_stops_after_cancellation(kv: WithTempDir<SqliteKv>) -> anyhow::Result<()> {
    let ctx = Context::background();
    for key in numbered_keys("key", 300) {
        kv.put(&ctx, &key, b"", false)?;
    }

    let list_ctx = ctx.child();
    let mut keys = kv.list(&list_ctx, b"")?;
    assert!(keys.next().is_some());
    list_ctx.cancel();

    // The keys which were already fetched are still returned.
    let rest = keys.by_ref().collect::<Vec<_>>();
    let (fetched, errors): (Vec<_>, Vec<_>) = rest.into_iter().partition(Result::is_ok);

    assert!(fetched.len() < 299);
    assert_eq!(errors.len(), 1);
    assert_that!(errors.into_iter().next().unwrap()).is_cancelled_by(Cancellation::Cancelled);
    assert!(keys.next().is_none());

    // The lock was released when the listing failed.
    kv.put(&ctx.with_timeout(Duration::from_secs(10)), b"other", b"", false)?;

    Ok(())
}

#[rstest]
fn readers_proceed_during_listing(mut config: WithTempDir<SqliteConfig>) -> anyhow::Result<()> {
    config.pool_size = Some(2);
    let store = config.open()?;
    let ctx = Context::background();
    let kv = store.root(&ctx)?;
    kv.put(&ctx, b"key", b"value", false)?;

    // Readers share the lock, so a read succeeds while a listing is in progress.
    let mut keys = kv.list(&ctx, b"")?;
    assert_eq!(kv.get(&ctx.with_timeout(TIMEOUT), b"key")?, b"value");
    assert!(keys.next().is_some());
    drop(keys);
    store.close(&ctx)?;

    Ok(())
}
