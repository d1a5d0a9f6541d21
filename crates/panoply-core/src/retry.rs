// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded retry policy.

use std::time::Duration;

/// A fixed-interval, bounded-attempt polling policy.
///
/// The queue's completion-polling loop is parameterized by this value
/// instead of hard-coding its cadence, so deployments can tune it to their
/// render worker's typical turnaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between consecutive attempts.
    pub interval: Duration,
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy from an interval and attempt budget.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Runs `probe` until it returns true or the attempt budget is spent,
    /// sleeping `interval` between attempts.
    ///
    /// Returns true on the first successful probe. `keep_going` is checked
    /// before each sleep so a stopping service abandons the wait promptly.
    pub fn poll_until(&self, mut probe: impl FnMut() -> bool, keep_going: impl Fn() -> bool) -> bool {
        for attempt in 1..=self.max_attempts {
            if probe() {
                return true;
            }
            if attempt < self.max_attempts {
                if !keep_going() {
                    return false;
                }
                std::thread::sleep(self.interval);
            }
        }
        false
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
        }
    }
}
