//! # CPU-Set Requests
//!
//! Named, refcounted constraints on the schedulable set. A `Min` request
//! forces CPUs on; a `Max` request caps the set.

use crate::cpumask::CpuMask;
use crate::{HmpError, HmpResult};
use alloc::string::String;
use alloc::vec::Vec;

/// Request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// CPUs that must stay schedulable
    Min,
    /// CPUs the schedulable set may not exceed
    Max,
}

#[derive(Debug, Clone)]
struct Request {
    name: String,
    kind: RequestKind,
    mask: CpuMask,
    refcount: u32,
}

/// All active requests
#[derive(Debug, Default)]
pub struct RequestList {
    requests: Vec<Request>,
}

impl RequestList {
    /// Create an empty list
    pub const fn new() -> Self {
        Self { requests: Vec::new() }
    }

    fn find(&mut self, name: &str, kind: RequestKind) -> Option<&mut Request> {
        self.requests
            .iter_mut()
            .find(|r| r.kind == kind && r.name == name)
    }

    /// Add a request, or take another reference and replace its mask
    pub fn register(&mut self, name: &str, kind: RequestKind, mask: CpuMask) -> HmpResult<()> {
        if name.is_empty() {
            return Err(HmpError::InvalidArgument);
        }
        if let Some(req) = self.find(name, kind) {
            req.refcount += 1;
            req.mask = mask;
            return Ok(());
        }

        self.requests
            .try_reserve(1)
            .map_err(|_| HmpError::OutOfResources)?;
        let mut owned = String::new();
        owned
            .try_reserve(name.len())
            .map_err(|_| HmpError::OutOfResources)?;
        owned.push_str(name);
        self.requests.push(Request { name: owned, kind, mask, refcount: 1 });
        Ok(())
    }

    /// Replace the mask of an existing request
    pub fn update(&mut self, name: &str, kind: RequestKind, mask: CpuMask) -> HmpResult<()> {
        let req = self.find(name, kind).ok_or(HmpError::RequestNotFound)?;
        req.mask = mask;
        Ok(())
    }

    /// Drop one reference; the request goes away at zero
    pub fn unregister(&mut self, name: &str, kind: RequestKind) -> HmpResult<()> {
        let pos = self
            .requests
            .iter()
            .position(|r| r.kind == kind && r.name == name)
            .ok_or(HmpError::RequestNotFound)?;
        let req = &mut self.requests[pos];
        req.refcount -= 1;
        if req.refcount == 0 {
            self.requests.swap_remove(pos);
        }
        Ok(())
    }

    /// Number of distinct requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// No requests
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// `(union of Min, intersection of Max)`; no Max request means `all`
    pub fn resolve(&self, all: CpuMask) -> (CpuMask, CpuMask) {
        self.requests
            .iter()
            .fold((CpuMask::empty(), all), |(min, max), r| match r.kind {
                RequestKind::Min => (min | r.mask, max),
                RequestKind::Max => (min, max & r.mask),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let all = CpuMask::first_n(8);
        let mut list = RequestList::new();
        assert_eq!(list.resolve(all), (CpuMask::empty(), all));

        list.register("camera", RequestKind::Min, CpuMask::from_cpus(&[4])).unwrap();
        list.register("audio", RequestKind::Min, CpuMask::from_cpus(&[5])).unwrap();
        list.register("thermal", RequestKind::Max, CpuMask::first_n(6)).unwrap();
        list.register("battery", RequestKind::Max, CpuMask::first_n(5)).unwrap();

        let (min, max) = list.resolve(all);
        assert_eq!(min, CpuMask::from_cpus(&[4, 5]));
        assert_eq!(max, CpuMask::first_n(5));
    }

    #[test]
    fn test_refcount() {
        let mut list = RequestList::new();
        list.register("x", RequestKind::Min, CpuMask::from_cpus(&[1])).unwrap();
        list.register("x", RequestKind::Min, CpuMask::from_cpus(&[2])).unwrap();
        assert_eq!(list.len(), 1);

        list.unregister("x", RequestKind::Min).unwrap();
        assert_eq!(list.resolve(CpuMask::first_n(4)).0, CpuMask::from_cpus(&[2]));
        list.unregister("x", RequestKind::Min).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.unregister("x", RequestKind::Min), Err(HmpError::RequestNotFound));
    }

    #[test]
    fn test_same_name_different_kind() {
        let mut list = RequestList::new();
        list.register("perf", RequestKind::Min, CpuMask::from_cpus(&[1])).unwrap();
        list.register("perf", RequestKind::Max, CpuMask::from_cpus(&[1, 2])).unwrap();
        assert_eq!(list.len(), 2);
        list.update("perf", RequestKind::Max, CpuMask::from_cpus(&[3])).unwrap();
        assert_eq!(list.update("nope", RequestKind::Max, CpuMask::empty()), Err(HmpError::RequestNotFound));
        assert_eq!(list.register("", RequestKind::Min, CpuMask::empty()), Err(HmpError::InvalidArgument));
    }
}
