use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;

/// Connection admission limits.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub max_connections_total: usize,
    pub max_connections_per_ip: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_connections_total: 1000,
            max_connections_per_ip: 16,
        }
    }
}

/// Reason a connection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitRejection {
    #[error("server at max connections")]
    TotalLimitReached,
    #[error("too many connections from this IP")]
    IpLimitReached,
}

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    per_ip: BTreeMap<IpAddr, usize>,
}

/// Tracks connection counts per IP and in total.
#[derive(Debug)]
pub struct ConnectionLimiter {
    config: LimiterConfig,
    counts: Mutex<Counts>,
}

/// A held connection slot; released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
    ip: IpAddr,
}

impl ConnectionLimiter {
    pub fn new(config: LimiterConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            counts: Mutex::new(Counts::default()),
        })
    }

    /// Try to admit a new connection from `ip`.
    pub fn try_admit(self: &Arc<Self>, ip: IpAddr) -> Result<ConnectionPermit, RateLimitRejection> {
        let mut counts = self.counts.lock();
        if counts.total >= self.config.max_connections_total {
            return Err(RateLimitRejection::TotalLimitReached);
        }
        let from_ip = counts.per_ip.get(&ip).copied().unwrap_or(0);
        if from_ip >= self.config.max_connections_per_ip {
            return Err(RateLimitRejection::IpLimitReached);
        }
        counts.per_ip.insert(ip, from_ip + 1);
        counts.total += 1;
        Ok(ConnectionPermit {
            limiter: Arc::clone(self),
            ip,
        })
    }

    fn release(&self, ip: IpAddr) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.per_ip.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.per_ip.remove(&ip);
            }
        }
        counts.total = counts.total.saturating_sub(1);
    }

    pub fn total_connections(&self) -> usize {
        self.counts.lock().total
    }

    pub fn connections_from(&self, ip: IpAddr) -> usize {
        self.counts.lock().per_ip.get(&ip).copied().unwrap_or(0)
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.release(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn admits_until_per_ip_limit() {
        let limiter = ConnectionLimiter::new(LimiterConfig {
            max_connections_total: 10,
            max_connections_per_ip: 2,
        });
        let _a = limiter.try_admit(ip(1)).unwrap();
        let _b = limiter.try_admit(ip(1)).unwrap();
        assert_eq!(
            limiter.try_admit(ip(1)).unwrap_err(),
            RateLimitRejection::IpLimitReached
        );
        assert!(limiter.try_admit(ip(2)).is_ok());
    }

    #[test]
    fn total_limit() {
        let limiter = ConnectionLimiter::new(LimiterConfig {
            max_connections_total: 2,
            max_connections_per_ip: 5,
        });
        let _a = limiter.try_admit(ip(1)).unwrap();
        let _b = limiter.try_admit(ip(2)).unwrap();
        assert_eq!(
            limiter.try_admit(ip(3)).unwrap_err(),
            RateLimitRejection::TotalLimitReached
        );
    }

    #[test]
    fn rejected_ips_leave_no_entries() {
        let limiter = ConnectionLimiter::new(LimiterConfig {
            max_connections_total: 10,
            max_connections_per_ip: 0,
        });
        for last in 0..50 {
            assert_eq!(
                limiter.try_admit(ip(last)).unwrap_err(),
                RateLimitRejection::IpLimitReached
            );
        }
        assert!(limiter.counts.lock().per_ip.is_empty());
        assert_eq!(limiter.total_connections(), 0);
    }

    #[test]
    fn dropping_permit_releases_slot() {
        let limiter = ConnectionLimiter::new(LimiterConfig {
            max_connections_total: 1,
            max_connections_per_ip: 1,
        });
        let permit = limiter.try_admit(ip(1)).unwrap();
        assert_eq!(limiter.total_connections(), 1);
        assert_eq!(limiter.connections_from(ip(1)), 1);
        drop(permit);
        assert_eq!(limiter.total_connections(), 0);
        assert_eq!(limiter.connections_from(ip(1)), 0);
        assert!(limiter.try_admit(ip(1)).is_ok());
    }
}
