/// Redis-backed storage medium.
///
/// Uses the synchronous connection API: every catalog mutation is a single `SET` of the
/// full blob, so no pipeline or transaction is needed. Failures are logged and returned
/// to the caller, which decides whether to degrade (reads) or surface them (writes).
///
/// Connecting and each command are bounded by timeouts, so an unreachable server fails
/// an operation instead of stalling the calling thread.
use std::time::Duration;

use redis::Commands;
use tracing::warn;

use crate::error::CommonError;
use crate::medium::StorageMedium;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisMedium {
    client: redis::Client,
}

impl RedisMedium {
    /// Parse the connection URL. No connection is opened until the first operation.
    pub fn new(url: &str) -> Result<Self, CommonError> {
        let client = redis::Client::open(url)
            .inspect_err(|e| warn!(error = %e, url, "failed to create redis client"))?;
        Ok(Self { client })
    }

    /// Send a PING. Returns `true` if Redis is reachable.
    pub fn is_available(&self) -> bool {
        let Ok(mut conn) = self.open() else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query(&mut conn);
        result.is_ok()
    }

    fn connection(&self) -> Result<redis::Connection, CommonError> {
        self.open()
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .map_err(CommonError::from)
    }

    fn open(&self) -> redis::RedisResult<redis::Connection> {
        let conn = self.client.get_connection_with_timeout(CONNECT_TIMEOUT)?;
        conn.set_read_timeout(Some(IO_TIMEOUT))?;
        conn.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(conn)
    }
}

impl StorageMedium for RedisMedium {
    fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn
            .get(key)
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(key, value)
            .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CommonError> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(key)
            .inspect_err(|e| warn!(error = %e, key, "redis DEL failed"))?;
        Ok(())
    }
}
