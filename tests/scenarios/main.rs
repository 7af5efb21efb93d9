//! End-to-end scenario tests exercising the full story-branching flow:
//! timeline authoring, forking, comparison, and merging through the
//! public `SagaRepo` API.

mod harness;

mod branching;
mod merging;
mod timeline;
