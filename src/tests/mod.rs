//! # Integration Test Suite for the Snow Report Service
//!
//! These tests drive the coordinator, the webcam cache and the scheduler
//! against an in-process HTTP stub, so the real `reqwest` client, timeouts and
//! status handling are exercised without leaving the machine.

mod support;
mod webcam_tests;
