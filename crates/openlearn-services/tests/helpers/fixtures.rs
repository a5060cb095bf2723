//! Principals and owning contexts shared by the integration tests.
//!
//! Organization 1 holds student 100, instructors 201 and 202, course 3 taught
//! by 201 with assignment 42, and student 100's portfolio item 7. Organization
//! 2 holds student 110 and instructor 210.

use openlearn_core::models::{OwningContext, Principal, UserRole};

pub const ORG_A: i64 = 1;
pub const ORG_B: i64 = 2;

pub const ASSIGNMENT_ID: i64 = 42;
pub const PORTFOLIO_ITEM_ID: i64 = 7;

pub fn student_a() -> Principal {
    Principal::new(100, ORG_A, UserRole::Student)
}

pub fn student_b() -> Principal {
    Principal::new(110, ORG_B, UserRole::Student)
}

pub fn course_instructor() -> Principal {
    Principal::new(201, ORG_A, UserRole::Instructor)
}

pub fn other_instructor_a() -> Principal {
    Principal::new(202, ORG_A, UserRole::Instructor)
}

pub fn instructor_b() -> Principal {
    Principal::new(210, ORG_B, UserRole::Instructor)
}

pub fn administrator() -> Principal {
    Principal::new(1, ORG_B, UserRole::Administrator)
}

pub fn assignment() -> OwningContext {
    OwningContext::GradedWork {
        assignment_id: ASSIGNMENT_ID,
        course_id: 3,
        organization_id: ORG_A,
        instructor_id: 201,
    }
}

pub fn portfolio() -> OwningContext {
    OwningContext::PortfolioEntry {
        portfolio_item_id: PORTFOLIO_ITEM_ID,
        organization_id: ORG_A,
        student_id: 100,
        supervising_instructors: vec![201],
    }
}
