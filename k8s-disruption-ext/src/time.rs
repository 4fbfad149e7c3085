use jiff::SignedDuration;

use super::*;

pub trait TimeExt {
    fn now() -> metav1::Time;
    fn age(&self, now: Timestamp) -> SignedDuration;
}

impl TimeExt for metav1::Time {
    /// Create a metav1::Time set to the current UTC time.
    ///
    fn now() -> metav1::Time {
        Self(Timestamp::now())
    }

    /// Time elapsed between this instant and `now`; negative if it lies in the future.
    ///
    /// # Examples
    ///
    /// ```
    /// # use k8s_disruption_ext::{jiff::Timestamp, metav1, TimeExt as _};
    /// let created = metav1::Time(Timestamp::from_second(100).unwrap());
    /// let now = Timestamp::from_second(160).unwrap();
    /// assert_eq!(created.age(now).as_secs(), 60);
    /// ```
    fn age(&self, now: Timestamp) -> SignedDuration {
        now.duration_since(self.0)
    }
}
