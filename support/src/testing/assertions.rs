//! Assertion macros returning `TestResult::Fail` on failure, for use inside
//! `fn() -> TestResult` test bodies.

#[macro_export]
macro_rules! assert_eq_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::klog_info!("ASSERT_EQ: expected {:?}, got {:?}", right, left);
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($left:expr, $right:expr, $msg:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::klog_info!("ASSERT_EQ: {} - expected {:?}, got {:?}", $msg, right, left);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_ne_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left == right {
            $crate::klog_info!("ASSERT_NE: values should differ, both are {:?}", left);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_test {
    ($cond:expr) => {{
        if !$cond {
            $crate::klog_info!("ASSERT: condition failed");
            return $crate::testing::TestResult::Fail;
        }
    }};
    ($cond:expr, $msg:expr) => {{
        if !$cond {
            $crate::klog_info!("ASSERT: {}", $msg);
            return $crate::testing::TestResult::Fail;
        }
    }};
}

#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {{
        match $result {
            Ok(v) => v,
            Err(e) => {
                $crate::klog_info!("ASSERT_OK: got Err({:?})", e);
                return $crate::testing::TestResult::Fail;
            }
        }
    }};
}
